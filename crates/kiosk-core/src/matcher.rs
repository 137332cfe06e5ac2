//! Face signature matching against the stored roster.

use crate::types::{Signature, SignatureRoster};

/// Maximum Euclidean distance for a stored signature to count as the same face.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.45;

/// Result of matching a probe signature against the roster.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched { name: String, distance: f32 },
    Unrecognized,
}

impl MatchOutcome {
    pub fn name(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched { name, .. } => Some(name),
            MatchOutcome::Unrecognized => None,
        }
    }
}

/// Strategy for resolving a probe signature to a roster entry.
pub trait Matcher {
    fn find(&self, probe: &Signature, roster: &SignatureRoster, threshold: f32) -> MatchOutcome;
}

/// Roster-order linear scan: the first entry strictly under the threshold wins,
/// even if a later entry is closer.
pub struct FirstMatchMatcher;

impl Matcher for FirstMatchMatcher {
    fn find(&self, probe: &Signature, roster: &SignatureRoster, threshold: f32) -> MatchOutcome {
        for (name, stored) in roster {
            let distance = stored.euclidean_distance(probe);
            if distance < threshold {
                return MatchOutcome::Matched {
                    name: name.clone(),
                    distance,
                };
            }
        }
        MatchOutcome::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(entries: &[(&str, Vec<f32>)]) -> SignatureRoster {
        entries
            .iter()
            .map(|(n, v)| (n.to_string(), Signature::new(v.clone())))
            .collect()
    }

    #[test]
    fn test_empty_roster_is_unrecognized() {
        let probe = Signature::new(vec![0.1, 0.2]);
        let result = FirstMatchMatcher.find(&probe, &SignatureRoster::new(), DEFAULT_MATCH_THRESHOLD);
        assert_eq!(result, MatchOutcome::Unrecognized);
    }

    #[test]
    fn test_first_entry_wins_over_closer_later_entry() {
        // Alice is 0.4 away, Bob is an exact match; Alice was registered first.
        let gallery = roster(&[("Alice", vec![0.4, 0.0]), ("Bob", vec![0.0, 0.0])]);
        let probe = Signature::new(vec![0.0, 0.0]);

        let result = FirstMatchMatcher.find(&probe, &gallery, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(result.name(), Some("Alice"));
    }

    #[test]
    fn test_skips_entries_outside_threshold() {
        let gallery = roster(&[("Alice", vec![1.0, 0.0]), ("Bob", vec![0.1, 0.0])]);
        let probe = Signature::new(vec![0.0, 0.0]);

        match FirstMatchMatcher.find(&probe, &gallery, DEFAULT_MATCH_THRESHOLD) {
            MatchOutcome::Matched { name, distance } => {
                assert_eq!(name, "Bob");
                assert!((distance - 0.1).abs() < 1e-6);
            }
            other => panic!("expected Bob, got {other:?}"),
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let gallery = roster(&[("Alice", vec![0.5, 0.0])]);
        let probe = Signature::new(vec![0.0, 0.0]);
        assert_eq!(FirstMatchMatcher.find(&probe, &gallery, 0.5), MatchOutcome::Unrecognized);
    }

    #[test]
    fn test_no_entry_within_threshold() {
        let gallery = roster(&[("Alice", vec![1.0, 1.0]), ("Bob", vec![-1.0, -1.0])]);
        let probe = Signature::new(vec![0.0, 0.0]);
        assert_eq!(
            FirstMatchMatcher.find(&probe, &gallery, DEFAULT_MATCH_THRESHOLD),
            MatchOutcome::Unrecognized
        );
    }
}
