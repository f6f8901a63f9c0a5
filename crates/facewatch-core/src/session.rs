//! Login/logout detection across consecutive frames.

use crate::event::Event;
use crate::types::{Identification, UNKNOWN_LABEL};
use std::collections::BTreeSet;

/// Changes between the previous frame and the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDiff {
    /// Labels present now but not in the previous frame, sorted.
    pub logins: Vec<String>,
    /// Labels present in the previous frame but not now, sorted.
    pub logouts: Vec<String>,
    /// An unresolved face is present now and was not in the previous frame.
    pub unknown_appeared: bool,
}

impl SessionDiff {
    pub fn is_empty(&self) -> bool {
        self.logins.is_empty() && self.logouts.is_empty()
    }

    /// Login event first, then logout; each only when non-empty.
    pub fn events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(2);
        if !self.logins.is_empty() {
            events.push(Event::Login { names: self.logins.clone() });
        }
        if !self.logouts.is_empty() {
            events.push(Event::Logout { names: self.logouts.clone() });
        }
        events
    }
}

/// Tracks which identities were present in the previous frame.
#[derive(Debug, Default)]
pub struct SessionTracker {
    present: BTreeSet<String>,
    unknown_present: bool,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff one frame's identifications against the previous frame and make
    /// them the new state. Unknown faces never log in or out.
    pub fn observe<'a, I>(&mut self, identities: I) -> SessionDiff
    where
        I: IntoIterator<Item = &'a Identification>,
    {
        let mut current = BTreeSet::new();
        let mut unknown_now = false;
        for identity in identities {
            match identity.label.as_deref() {
                Some(label) if label != UNKNOWN_LABEL => {
                    current.insert(label.to_string());
                }
                _ => unknown_now = true,
            }
        }

        let diff = SessionDiff {
            logins: current.difference(&self.present).cloned().collect(),
            logouts: self.present.difference(&current).cloned().collect(),
            unknown_appeared: unknown_now && !self.unknown_present,
        };

        self.present = current;
        self.unknown_present = unknown_now;
        diff
    }

    /// Forget everyone, returning the labels that were present (sorted).
    pub fn clear(&mut self) -> Vec<String> {
        self.unknown_present = false;
        std::mem::take(&mut self.present).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(names: &[&str]) -> Vec<Identification> {
        names.iter().map(|n| Identification::known(*n, 0.3)).collect()
    }

    #[test]
    fn test_first_frame_logs_in() {
        let mut tracker = SessionTracker::new();
        let diff = tracker.observe(&known(&["bob", "alice"]));
        assert_eq!(diff.logins, vec!["alice", "bob"]);
        assert!(diff.logouts.is_empty());
    }

    #[test]
    fn test_swap_emits_login_and_logout() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&known(&["alice"]));

        let diff = tracker.observe(&known(&["bob"]));
        assert_eq!(diff.logins, vec!["bob"]);
        assert_eq!(diff.logouts, vec!["alice"]);
        assert_eq!(
            diff.events(),
            vec![
                Event::Login { names: vec!["bob".into()] },
                Event::Logout { names: vec!["alice".into()] },
            ]
        );
    }

    #[test]
    fn test_unchanged_frame_emits_nothing() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&known(&["alice", "bob"]));

        let diff = tracker.observe(&known(&["bob", "alice"]));
        assert!(diff.is_empty());
        assert!(diff.events().is_empty());
        assert_eq!(tracker.clear(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_state_replaced_even_without_events() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&known(&["alice"]));
        tracker.observe(&known(&["alice"]));

        let diff = tracker.observe(&[]);
        assert_eq!(diff.logouts, vec!["alice"]);
        assert!(tracker.clear().is_empty());
    }

    #[test]
    fn test_duplicate_labels_collapse() {
        let mut tracker = SessionTracker::new();
        let diff = tracker.observe(&known(&["alice", "alice"]));
        assert_eq!(diff.logins, vec!["alice"]);
        assert_eq!(tracker.clear(), vec!["alice"]);
    }

    #[test]
    fn test_unknown_excluded_from_accounting() {
        let mut tracker = SessionTracker::new();
        let mut frame = known(&["alice"]);
        frame.push(Identification::unknown(0.9));

        let diff = tracker.observe(&frame);
        assert_eq!(diff.logins, vec!["alice"]);
        assert!(diff.unknown_appeared);

        // Unknown still present: not a new appearance.
        let diff = tracker.observe(&frame);
        assert!(!diff.unknown_appeared);
        assert!(diff.is_empty());

        let diff = tracker.observe(&known(&["alice"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_reserved_unknown_label_never_logs_in() {
        let mut tracker = SessionTracker::new();
        let frame = vec![Identification::known(UNKNOWN_LABEL, 0.1)];

        let diff = tracker.observe(&frame);
        assert!(diff.is_empty());
        assert!(diff.unknown_appeared);
        assert!(tracker.clear().is_empty());
    }

    #[test]
    fn test_clear_returns_everyone_once() {
        let mut tracker = SessionTracker::new();
        tracker.observe(&known(&["bob", "alice"]));

        assert_eq!(tracker.clear(), vec!["alice", "bob"]);
        assert!(tracker.clear().is_empty());

        let diff = tracker.observe(&known(&["alice"]));
        assert_eq!(diff.logins, vec!["alice"]);
    }
}
