use std::collections::HashSet;

use tracing::trace;

/// Key used to decide whether two phrase texts are duplicates.
///
/// Trims, lower-cases and collapses internal whitespace runs to one space.
pub fn normalize_for_comparison(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split a multi-line paste into trimmed, non-empty candidate lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome of checking candidate phrases against a category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertPlan {
    /// Texts to insert, in input order, trimmed.
    pub to_insert: Vec<String>,
    /// Candidates that were skipped, exactly as supplied.
    pub duplicates: Vec<String>,
}

/// Decide which candidates are new for a category.
///
/// `existing` is a snapshot of the texts already stored in the category. A
/// candidate is skipped if it matches the snapshot or an earlier candidate of
/// the same batch; the first occurrence wins.
pub fn plan_phrase_insert<S, E>(candidates: &[S], existing: &[E]) -> InsertPlan
where
    S: AsRef<str>,
    E: AsRef<str>,
{
    let existing: HashSet<String> = existing
        .iter()
        .map(|text| normalize_for_comparison(text.as_ref()))
        .collect();
    let mut seen = HashSet::new();
    let mut plan = InsertPlan::default();

    for candidate in candidates {
        let raw = candidate.as_ref();
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let key = normalize_for_comparison(text);
        if existing.contains(&key) || !seen.insert(key) {
            trace!(text = %raw, "Skipping duplicate phrase");
            plan.duplicates.push(raw.to_string());
            continue;
        }
        plan.to_insert.push(text.to_string());
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn comparison_key_ignores_case_and_spacing() {
        assert_eq!(
            normalize_for_comparison("  Red   Hair "),
            normalize_for_comparison("red hair")
        );
        assert_eq!(normalize_for_comparison("A\tB\nC"), "a b c");
    }

    #[test]
    fn bulk_batch_dedups_within_itself() {
        let existing: [&str; 0] = [];
        let plan = plan_phrase_insert(&["Red Hair", "red  hair", "Blue Eyes"], &existing);
        assert_eq!(plan.to_insert, vec!["Red Hair", "Blue Eyes"]);
        assert_eq!(plan.duplicates, vec!["red  hair"]);
    }

    #[test]
    fn bulk_batch_dedups_against_snapshot() {
        let plan = plan_phrase_insert(&["blue eyes", "Green hat"], &["BLUE EYES"]);
        assert_eq!(plan.to_insert, vec!["Green hat"]);
        assert_eq!(plan.duplicates, vec!["blue eyes"]);
    }

    #[test]
    fn split_lines_drops_blank_lines() {
        assert_eq!(
            split_lines("one\r\n\n  two  \n   \nthree"),
            vec!["one", "two", "three"]
        );
    }

    proptest! {
        #[test]
        fn prop_plan_partitions_candidates(
            candidates in proptest::collection::vec("[a-cA-C ]{1,5}", 0..12),
            existing in proptest::collection::vec("[a-c ]{1,5}", 0..4),
        ) {
            let plan = plan_phrase_insert(&candidates, &existing);
            let non_blank = candidates.iter().filter(|c| !c.trim().is_empty()).count();
            prop_assert_eq!(plan.to_insert.len() + plan.duplicates.len(), non_blank);

            let keys: HashSet<String> = plan
                .to_insert
                .iter()
                .map(|t| normalize_for_comparison(t))
                .collect();
            prop_assert_eq!(keys.len(), plan.to_insert.len());
            for text in &existing {
                prop_assert!(!keys.contains(&normalize_for_comparison(text)));
            }
        }
    }
}
