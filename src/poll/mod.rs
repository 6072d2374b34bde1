//! Ephemeral poll and Q&A data model
//!
//! The hub itself is a pure relay and keeps no tally of its own; these
//! types are the client-side model (embedded by UIs driven from this
//! crate) for the `start-poll` / `new-vote` and `new-question` events.
//! A tally lives only as long as the poll it belongs to and is replaced
//! wholesale when the next poll starts.

use serde::{Deserialize, Serialize};

/// Poll definition as carried by `start-poll`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollDefinition {
    pub question: String,
    pub options: Vec<String>,
}

impl PollDefinition {
    /// Client-side validation: a non-empty question and at least two
    /// non-empty, trimmed options. The relay never enforces this.
    pub fn is_valid(&self) -> bool {
        if self.question.trim().is_empty() {
            return false;
        }
        let non_empty = self
            .options
            .iter()
            .filter(|o| !o.trim().is_empty())
            .count();
        non_empty >= 2
    }
}

/// Per-option vote counts for the currently displayed poll
///
/// Options keep their declared order; duplicates are not collapsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollTally {
    question: String,
    counts: Vec<(String, u64)>,
}

impl PollTally {
    /// Initialize a zero tally from a poll definition.
    pub fn new(definition: &PollDefinition) -> Self {
        Self {
            question: definition.question.clone(),
            counts: definition
                .options
                .iter()
                .map(|o| (o.clone(), 0))
                .collect(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Record one `new-vote`. Votes for options the poll never declared
    /// are ignored: no new entry is created and nothing is counted.
    pub fn record_vote(&mut self, option: &str) -> bool {
        match self.counts.iter_mut().find(|(o, _)| o == option) {
            Some((_, count)) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn count(&self, option: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(o, _)| o == option)
            .map(|(_, c)| *c)
    }

    pub fn counts(&self) -> &[(String, u64)] {
        &self.counts
    }

    pub fn total_votes(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }
}

/// One relayed Q&A question as carried by `new-question`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaQuestion {
    pub username: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_poll() -> PollDefinition {
        PollDefinition {
            question: "Best talk so far?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        }
    }

    #[test]
    fn test_tally_starts_at_zero() {
        let tally = PollTally::new(&ab_poll());
        assert_eq!(tally.count("A"), Some(0));
        assert_eq!(tally.count("B"), Some(0));
        assert_eq!(tally.total_votes(), 0);
    }

    #[test]
    fn test_vote_increments_only_that_option() {
        let mut tally = PollTally::new(&ab_poll());
        assert!(tally.record_vote("A"));
        assert_eq!(tally.count("A"), Some(1));
        assert_eq!(tally.count("B"), Some(0));
    }

    #[test]
    fn test_unknown_option_ignored() {
        let mut tally = PollTally::new(&ab_poll());
        assert!(!tally.record_vote("C"));
        // No entry fabricated, nothing counted
        assert_eq!(tally.count("C"), None);
        assert_eq!(tally.counts().len(), 2);
        assert_eq!(tally.total_votes(), 0);
    }

    #[test]
    fn test_duplicate_option_labels_kept() {
        let definition = PollDefinition {
            question: "q".to_string(),
            options: vec!["A".to_string(), "A".to_string()],
        };
        let mut tally = PollTally::new(&definition);
        assert_eq!(tally.counts().len(), 2);
        // First matching entry wins, as on a rendered list
        tally.record_vote("A");
        assert_eq!(tally.counts()[0].1, 1);
        assert_eq!(tally.counts()[1].1, 0);
    }

    #[test]
    fn test_definition_validation() {
        assert!(ab_poll().is_valid());

        let no_question = PollDefinition {
            question: "  ".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        };
        assert!(!no_question.is_valid());

        let one_option = PollDefinition {
            question: "q".to_string(),
            options: vec!["A".to_string(), "   ".to_string()],
        };
        assert!(!one_option.is_valid());
    }

    #[test]
    fn test_question_matches_new_question_payload() {
        // The data object carried by a relayed new-question event
        let relayed = serde_json::to_value(crate::relay::ServerMessage::NewQuestion {
            username: "ana".to_string(),
            message: "how does this work?".to_string(),
        })
        .unwrap();
        let question: QaQuestion = serde_json::from_value(relayed["data"].clone()).unwrap();
        assert_eq!(question.username, "ana");
        assert_eq!(question.message, "how does this work?");
    }

    #[test]
    fn test_next_poll_replaces_tally() {
        let mut tally = PollTally::new(&ab_poll());
        tally.record_vote("A");

        let next = PollDefinition {
            question: "Lunch?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
        };
        tally = PollTally::new(&next);
        assert_eq!(tally.question(), "Lunch?");
        assert_eq!(tally.count("A"), None);
        assert_eq!(tally.total_votes(), 0);
    }
}
