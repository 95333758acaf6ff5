/// The worker's analysis pipeline, indexed by phase number.
pub const PIPELINE_PHASES: [(u32, &str); 9] = [
    (1, "Basic Processing"),
    (2, "Basic Statistics"),
    (3, "Sentiment Analysis"),
    (4, "Subjectivity Analysis"),
    (5, "Category Classification"),
    (6, "Hierarchical Topic Analysis"),
    (7, "Intelligent Summary"),
    (8, "Strategic Insights"),
    (9, "Visualization Generation"),
];

/// Display name of a pipeline phase.
pub fn phase_name(phase: u32) -> Option<&'static str> {
    PIPELINE_PHASES
        .iter()
        .find(|(n, _)| *n == phase)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_name_lookup() {
        assert_eq!(phase_name(3), Some("Sentiment Analysis"));
        assert_eq!(phase_name(0), None);
        assert_eq!(phase_name(10), None);
    }
}
