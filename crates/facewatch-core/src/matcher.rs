//! Identity matching policies.
//!
//! Both policies sit behind [`Matcher`] so the live loop never cares which
//! one is configured.

use crate::types::{Embedding, EnrollmentRecord, Identification};
use std::fmt;
use std::str::FromStr;

/// Distance reported when there is nothing to compare against.
pub const NO_MATCH_DISTANCE: f32 = 1.0;

/// Default tolerance for [`DistanceMatcher`]. Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Fixed per-entry comparison threshold used by [`VoteMatcher`].
pub const VOTE_MATCH_DISTANCE: f32 = 0.6;

/// Strategy for resolving a probe embedding against the enrolled records.
pub trait Matcher: Send + Sync {
    fn identify(&self, probe: &Embedding, gallery: &[EnrollmentRecord]) -> Identification;
}

/// Nearest neighbour under a tolerance.
///
/// The closest record wins if its distance is strictly below the tolerance.
/// Among records at exactly the same distance the earliest enrolled wins.
#[derive(Debug, Clone, Copy)]
pub struct DistanceMatcher {
    tolerance: f32,
}

impl DistanceMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }
}

impl Default for DistanceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl Matcher for DistanceMatcher {
    fn identify(&self, probe: &Embedding, gallery: &[EnrollmentRecord]) -> Identification {
        let mut nearest: Option<(usize, f32)> = None;

        for (i, record) in gallery.iter().enumerate() {
            let distance = probe.euclidean_distance(&record.embedding);
            match nearest {
                Some((_, best)) if distance >= best => {}
                _ => nearest = Some((i, distance)),
            }
        }

        match nearest {
            Some((idx, distance)) if distance < self.tolerance => {
                Identification::known(gallery[idx].label.clone(), distance)
            }
            Some((_, distance)) => Identification::unknown(distance),
            None => Identification::unknown(NO_MATCH_DISTANCE),
        }
    }
}

/// Majority vote over every record within the fixed comparison threshold.
///
/// Ties go to the label whose first matching record was enrolled earliest.
#[derive(Debug, Clone, Copy)]
pub struct VoteMatcher {
    threshold: f32,
}

impl Default for VoteMatcher {
    fn default() -> Self {
        Self {
            threshold: VOTE_MATCH_DISTANCE,
        }
    }
}

struct Tally<'a> {
    label: &'a str,
    votes: usize,
    closest: f32,
}

impl Matcher for VoteMatcher {
    fn identify(&self, probe: &Embedding, gallery: &[EnrollmentRecord]) -> Identification {
        // Tallies stay in order of each label's first matching record.
        let mut tallies: Vec<Tally<'_>> = Vec::new();
        let mut closest_overall = NO_MATCH_DISTANCE;

        for (i, record) in gallery.iter().enumerate() {
            let distance = probe.euclidean_distance(&record.embedding);
            if i == 0 || distance < closest_overall {
                closest_overall = distance;
            }
            if distance > self.threshold {
                continue;
            }

            match tallies.iter_mut().find(|t| t.label == record.label) {
                Some(tally) => {
                    tally.votes += 1;
                    tally.closest = tally.closest.min(distance);
                }
                None => tallies.push(Tally {
                    label: &record.label,
                    votes: 1,
                    closest: distance,
                }),
            }
        }

        let winner = tallies
            .iter()
            .reduce(|best, t| if t.votes > best.votes { t } else { best });

        match winner {
            Some(t) => Identification::known(t.label, t.closest),
            None => Identification::unknown(closest_overall),
        }
    }
}

/// Configured matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Nearest neighbour under the configured tolerance.
    #[default]
    Distance,
    /// Majority vote over entries within the fixed threshold.
    Vote,
}

impl MatchPolicy {
    /// Build the matcher for this policy. `tolerance` only affects `Distance`.
    pub fn matcher(self, tolerance: f32) -> Box<dyn Matcher> {
        match self {
            MatchPolicy::Distance => Box::new(DistanceMatcher::new(tolerance)),
            MatchPolicy::Vote => Box::new(VoteMatcher::default()),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distance" | "nearest" => Ok(MatchPolicy::Distance),
            "vote" | "votes" => Ok(MatchPolicy::Vote),
            other => Err(format!("unknown match policy '{other}' (expected 'distance' or 'vote')")),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchPolicy::Distance => "distance",
            MatchPolicy::Vote => "vote",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str, values: &[f32]) -> EnrollmentRecord {
        EnrollmentRecord::new(label, Embedding::new(values.to_vec()))
    }

    fn probe(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_distance_empty_gallery_is_unknown() {
        let result = DistanceMatcher::new(0.6).identify(&probe(&[1.0, 0.0]), &[]);
        assert!(!result.is_known());
        assert_eq!(result.distance, NO_MATCH_DISTANCE);

        // Still unknown for a permissive tolerance below the sentinel.
        let result = DistanceMatcher::new(0.99).identify(&probe(&[1.0, 0.0]), &[]);
        assert!(!result.is_known());
    }

    #[test]
    fn test_distance_identical_embedding_matches() {
        let gallery = vec![
            record("alice", &[0.0, 1.0, 0.0]),
            record("bob", &[1.0, 0.0, 0.0]),
        ];
        let result = DistanceMatcher::new(0.01).identify(&probe(&[1.0, 0.0, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("bob"));
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_distance_threshold_is_strict() {
        let gallery = vec![record("alice", &[0.0, 0.0])];
        // distance 0.5 against tolerance 0.5 is not a match
        let result = DistanceMatcher::new(0.5).identify(&probe(&[0.5, 0.0]), &gallery);
        assert!(!result.is_known());
        assert!((result.distance - 0.5).abs() < 1e-6);

        let result = DistanceMatcher::new(0.51).identify(&probe(&[0.5, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_distance_picks_nearest_first_on_tie() {
        let gallery = vec![
            record("carol", &[0.3, 0.0]),
            record("alice", &[0.1, 0.0]),
            record("bob", &[-0.1, 0.0]),
        ];
        let result = DistanceMatcher::default().identify(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_vote_single_matching_label_wins() {
        // Many "bob" entries, none within threshold; one "alice" entry that matches.
        let mut gallery: Vec<_> = (0..10).map(|_| record("bob", &[5.0, 5.0])).collect();
        gallery.push(record("alice", &[0.1, 0.0]));

        let result = VoteMatcher::default().identify(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("alice"));
        assert!((result.distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_vote_majority() {
        let gallery = vec![
            record("alice", &[0.05, 0.0]),
            record("bob", &[0.2, 0.0]),
            record("bob", &[0.3, 0.0]),
        ];
        let result = VoteMatcher::default().identify(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("bob"));
        assert!((result.distance - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_vote_tie_goes_to_first_enrolled() {
        let gallery = vec![
            record("bob", &[0.4, 0.0]),
            record("alice", &[0.1, 0.0]),
        ];
        let result = VoteMatcher::default().identify(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.label.as_deref(), Some("bob"));
    }

    #[test]
    fn test_vote_no_match_is_unknown() {
        let gallery = vec![record("alice", &[3.0, 4.0])];
        let result = VoteMatcher::default().identify(&probe(&[0.0, 0.0]), &gallery);
        assert!(!result.is_known());
        assert!((result.distance - 5.0).abs() < 1e-6);

        let result = VoteMatcher::default().identify(&probe(&[0.0, 0.0]), &[]);
        assert_eq!(result.distance, NO_MATCH_DISTANCE);
    }

    #[test]
    fn test_match_policy_parse() {
        assert_eq!("distance".parse::<MatchPolicy>(), Ok(MatchPolicy::Distance));
        assert_eq!("Vote".parse::<MatchPolicy>(), Ok(MatchPolicy::Vote));
        assert!("majority".parse::<MatchPolicy>().is_err());
    }

    #[test]
    fn test_match_policy_builds_matcher() {
        let gallery = vec![record("alice", &[0.5, 0.0])];
        let strict = MatchPolicy::Distance.matcher(0.1);
        assert!(!strict.identify(&probe(&[0.0, 0.0]), &gallery).is_known());
        let vote = MatchPolicy::Vote.matcher(0.1);
        assert!(vote.identify(&probe(&[0.0, 0.0]), &gallery).is_known());
    }
}
