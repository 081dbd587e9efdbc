//! Majority-vote aggregation of per-frame labels.

use std::collections::HashMap;

use vscope_models::{ActionCount, LabelVote, UNKNOWN_ACTION};

/// Aggregated view of a run's label votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSummary {
    pub representative_action: String,
    pub breakdown: Vec<ActionCount>,
    pub frame_count: u32,
}

/// Count labels, most frequent first. Equal counts keep first-seen order.
pub fn action_breakdown<S: AsRef<str>>(labels: &[S]) -> Vec<ActionCount> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<ActionCount> = Vec::new();

    for label in labels {
        let label = label.as_ref();
        match positions.get(label) {
            Some(&i) => counts[i].frames += 1,
            None => {
                positions.insert(label, counts.len());
                counts.push(ActionCount {
                    label: label.to_string(),
                    frames: 1,
                });
            }
        }
    }

    // Stable sort: ties stay in first-seen order.
    counts.sort_by(|a, b| b.frames.cmp(&a.frames));
    counts
}

/// The most frequent label, or [`UNKNOWN_ACTION`] for an empty input.
///
/// ```
/// use vscope_worker::aggregator::representative_action;
///
/// assert_eq!(representative_action(&["run", "run", "walk"]), "run");
/// assert_eq!(representative_action(&["run", "walk"]), "run");
/// assert_eq!(representative_action::<&str>(&[]), "unknown");
/// ```
pub fn representative_action<S: AsRef<str>>(labels: &[S]) -> String {
    action_breakdown(labels)
        .into_iter()
        .next()
        .map(|c| c.label)
        .unwrap_or_else(|| UNKNOWN_ACTION.to_string())
}

/// Summarize votes, in ordinal order.
pub fn summarize(votes: &[LabelVote]) -> ActionSummary {
    let mut ordered: Vec<&LabelVote> = votes.iter().collect();
    ordered.sort_by_key(|v| v.ordinal);
    let labels: Vec<&str> = ordered.iter().map(|v| v.label.as_str()).collect();

    let breakdown = action_breakdown(&labels);
    let representative_action = breakdown
        .first()
        .map(|c| c.label.clone())
        .unwrap_or_else(|| UNKNOWN_ACTION.to_string());

    ActionSummary {
        representative_action,
        breakdown,
        frame_count: labels.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_wins() {
        assert_eq!(representative_action(&["run", "run", "walk"]), "run");
        assert_eq!(representative_action(&["walk", "run", "run"]), "run");
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        assert_eq!(representative_action(&["run", "walk"]), "run");
        assert_eq!(representative_action(&["walk", "run"]), "walk");
        assert_eq!(
            representative_action(&["b", "a", "a", "b", "c"]),
            "b"
        );
    }

    #[test]
    fn test_empty_is_unknown() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(representative_action(&empty), UNKNOWN_ACTION);
        assert_eq!(summarize(&[]).representative_action, "unknown");
        assert_eq!(summarize(&[]).frame_count, 0);
    }

    #[test]
    fn test_breakdown_order() {
        let breakdown = action_breakdown(&["walk", "run", "swim", "run"]);
        let labels: Vec<_> = breakdown.iter().map(|c| (c.label.as_str(), c.frames)).collect();
        assert_eq!(labels, vec![("run", 2), ("walk", 1), ("swim", 1)]);
    }

    #[test]
    fn test_summarize_uses_ordinal_order() {
        let votes = vec![
            LabelVote::new(1, "walk", 0.9),
            LabelVote::new(0, "run", 0.8),
        ];
        let summary = summarize(&votes);
        assert_eq!(summary.representative_action, "run");
        assert_eq!(summary.frame_count, 2);
    }
}
