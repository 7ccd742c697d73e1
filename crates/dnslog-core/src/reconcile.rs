//! Merging freshly fetched results into the accumulated result set
//!
//! The merge mode is always supplied by the caller. Nothing here looks at the
//! data to guess whether a fetch should replace or extend what is already
//! shown.

use serde::{Deserialize, Serialize};

/// How a successful fetch is merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// The fetch supersedes everything shown so far
    #[default]
    Replace,
    /// The fetch is concatenated after what is shown so far
    Append,
}

/// What a failed fetch does to the accumulated set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnFailure {
    /// Leave the accumulated set untouched
    #[default]
    Keep,
    /// Drop the accumulated set so no stale data is shown next to an error
    Clear,
}

/// Merge `incoming` into `existing`
///
/// - `Replace`: the result is exactly `incoming`; an empty fetch yields an
///   empty set.
/// - `Append`: `existing` followed by `incoming` in fetch order. Duplicates
///   are kept, since overlapping polls legitimately observe the same hit.
pub fn reconcile<T>(existing: Vec<T>, incoming: Vec<T>, mode: ReconcileMode) -> Vec<T> {
    match mode {
        ReconcileMode::Replace => incoming,
        ReconcileMode::Append => {
            let mut merged = existing;
            merged.extend(incoming);
            merged
        }
    }
}

/// Apply a failed fetch to `existing`
pub fn reconcile_failure<T>(existing: Vec<T>, policy: OnFailure) -> Vec<T> {
    match policy {
        OnFailure::Keep => existing,
        OnFailure::Clear => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_concatenates_in_order() {
        let merged = reconcile(vec!["a", "b"], vec!["c"], ReconcileMode::Append);
        assert_eq!(merged, vec!["a", "b", "c"]);
    }

    #[test]
    fn append_keeps_duplicates() {
        let merged = reconcile(vec!["a"], vec!["a", "a"], ReconcileMode::Append);
        assert_eq!(merged, vec!["a", "a", "a"]);
    }

    #[test]
    fn replace_takes_incoming_even_when_empty() {
        assert_eq!(
            reconcile(vec!["a", "b"], vec!["c"], ReconcileMode::Replace),
            vec!["c"]
        );
        assert!(reconcile(vec!["a", "b"], Vec::<&str>::new(), ReconcileMode::Replace).is_empty());
    }

    #[test]
    fn failure_policy_is_explicit() {
        assert_eq!(reconcile_failure(vec![1, 2], OnFailure::Keep), vec![1, 2]);
        assert!(reconcile_failure(vec![1, 2], OnFailure::Clear).is_empty());
    }
}
