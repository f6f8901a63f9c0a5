use crate::control::ControlState;
use crate::extend::DatasetExtender;
use crate::render::{RenderError, Renderer};
use facewatch_core::{
    recognize_faces, Detector, Encoder, EncodingDatabase, EventWriter, Matcher, PipelineError,
    SessionTracker,
};
use facewatch_hw::{CameraError, FramePrep, FrameSource};
use std::io::Write;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Longest uninterrupted sleep between cycles, so shutdown is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("recognition failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("failed to write event: {0}")]
    Output(#[from] std::io::Error),
}

/// Everything the engine needs, assembled by the caller.
pub struct EngineParts {
    pub source: Box<dyn FrameSource>,
    pub detector: Box<dyn Detector>,
    pub encoder: Box<dyn Encoder>,
    pub matcher: Box<dyn Matcher>,
    pub renderer: Box<dyn Renderer>,
    pub database: EncodingDatabase,
    pub extender: Option<DatasetExtender>,
    pub prep: FramePrep,
    pub interval: Duration,
}

/// The recognition loop: capture, prepare, recognize, diff, emit.
pub struct Engine<W: Write> {
    parts: EngineParts,
    control: Arc<ControlState>,
    tracker: SessionTracker,
    events: EventWriter<W>,
    active: bool,
}

impl<W: Write> Engine<W> {
    pub fn new(parts: EngineParts, control: Arc<ControlState>, events: EventWriter<W>) -> Self {
        Self {
            parts,
            control,
            tracker: SessionTracker::new(),
            events,
            active: true,
        }
    }

    /// Run until shutdown is requested or a cycle fails.
    pub fn run(&mut self) -> Result<(), EngineError> {
        tracing::info!(
            source = %self.parts.source.describe(),
            records = self.parts.database.len(),
            interval_ms = self.parts.interval.as_millis() as u64,
            "recognition loop starting"
        );

        while !self.control.shutdown_requested() {
            let started = Instant::now();
            self.tick()?;
            self.sleep_until(started + self.parts.interval);
        }

        // `exit` pauses and shuts down together; log everyone out even when
        // shutdown was seen first.
        if self.active && !self.control.recognition_enabled() {
            self.pause()?;
        }

        tracing::info!("recognition loop stopped");
        Ok(())
    }

    /// One iteration: apply any run-state change, then process a frame if
    /// recognition is enabled.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        let enabled = self.control.recognition_enabled();
        if enabled != self.active {
            if enabled {
                self.resume()?;
            } else {
                self.pause()?;
            }
        }
        if self.active {
            self.process_frame()?;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.events
            .status("Stopping face recognition and logging out any logged in users.")?;
        self.parts.source.pause();
        let names = self.tracker.clear();
        if !names.is_empty() {
            self.events.emit(&facewatch_core::Event::Logout { names })?;
        }
        self.active = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.events.status("Starting face recognition.")?;
        self.parts.source.resume();
        self.active = true;
        Ok(())
    }

    fn process_frame(&mut self) -> Result<(), EngineError> {
        let parts = &mut self.parts;
        let frame = parts.source.capture()?;
        let prepared = parts.prep.prepare(frame.image);

        let faces = recognize_faces(
            &mut parts.detector,
            &mut parts.encoder,
            parts.matcher.as_ref(),
            parts.database.records(),
            prepared.processed(),
        )?;
        for face in &faces {
            tracing::debug!("{} ({:.3})", face.identity.name(), face.identity.distance);
        }

        let diff = self.tracker.observe(faces.iter().map(|f| &f.identity));
        for event in diff.events() {
            self.events.emit(&event)?;
        }

        if let Some(extender) = &parts.extender {
            for label in &diff.logins {
                extender.save(label, &prepared.full);
            }
            if diff.unknown_appeared {
                extender.save_unknown(&prepared.full);
            }
        }

        if let Some(event) = parts.renderer.render(prepared.processed(), &faces)? {
            self.events.emit(&event)?;
        }
        Ok(())
    }

    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.control.shutdown_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Run the engine on a dedicated OS thread.
pub fn spawn_engine<W>(mut engine: Engine<W>) -> std::io::Result<JoinHandle<Result<(), EngineError>>>
where
    W: Write + Send + 'static,
{
    std::thread::Builder::new()
        .name("facewatch-engine".into())
        .spawn(move || {
            let result = engine.run();
            if let Err(e) = &result {
                tracing::error!(error = %e, "engine stopped with error");
            }
            result
        })
}
