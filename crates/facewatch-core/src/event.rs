//! Newline-delimited JSON events for the consuming dashboard.
//!
//! Every line is one object with exactly one key naming the event kind:
//!
//! ```text
//! {"status":"starting video stream..."}
//! {"login":{"names":["alice"]}}
//! {"logout":{"names":["alice","bob"]}}
//! {"camera_image":{"image":"/9j/4AAQ..."}}
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Write};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Status(String),
    Login { names: Vec<String> },
    Logout { names: Vec<String> },
    /// Annotated frame as a base64-encoded JPEG.
    CameraImage { image: String },
}

impl Event {
    pub fn status(message: impl Into<String>) -> Self {
        Event::Status(message.into())
    }
}

/// Writes one event per line and flushes after each, so a reader on the
/// other end of a pipe sees events as they happen.
pub struct EventWriter<W: Write> {
    out: W,
}

impl EventWriter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn emit(&mut self, event: &Event) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    pub fn status(&mut self, message: impl Into<String>) -> io::Result<()> {
        self.emit(&Event::status(message))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(writer: EventWriter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(writer.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_event_json_shapes() {
        let mut writer = EventWriter::new(Vec::new());
        writer.status("loading encodings...").unwrap();
        writer
            .emit(&Event::Login { names: vec!["alice".into()] })
            .unwrap();
        writer
            .emit(&Event::Logout { names: vec!["alice".into(), "bob".into()] })
            .unwrap();
        writer
            .emit(&Event::CameraImage { image: "aGk=".into() })
            .unwrap();

        assert_eq!(
            lines(writer),
            vec![
                r#"{"status":"loading encodings..."}"#,
                r#"{"login":{"names":["alice"]}}"#,
                r#"{"logout":{"names":["alice","bob"]}}"#,
                r#"{"camera_image":{"image":"aGk="}}"#,
            ]
        );
    }

    #[test]
    fn test_each_line_parses_independently() {
        let mut writer = EventWriter::new(Vec::new());
        writer.emit(&Event::Login { names: vec!["bob".into()] }).unwrap();
        writer.status("line two").unwrap();

        for line in lines(writer) {
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert_eq!(value.as_object().map(|o| o.len()), Some(1));
        }
    }
}
