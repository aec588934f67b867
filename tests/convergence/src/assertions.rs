//! Assertion helpers for convergence testing.
//!
//! These are pure functions that compare environment contents after a sync
//! round. They take documents as input and return pass/fail.

use serde_json::Value;
use std::collections::BTreeMap;
use sync_types::Document;

/// Result of an assertion check.
#[derive(Debug, Clone)]
pub struct AssertionResult {
    /// Whether the assertion passed
    pub passed: bool,
    /// Description of what was checked
    pub description: String,
    /// Details on failure
    pub failure_details: Option<String>,
}

impl AssertionResult {
    /// Create a passing result.
    pub fn pass(description: &str) -> Self {
        Self {
            passed: true,
            description: description.into(),
            failure_details: None,
        }
    }

    /// Create a failing result.
    pub fn fail(description: &str, details: &str) -> Self {
        Self {
            passed: false,
            description: description.into(),
            failure_details: Some(details.into()),
        }
    }

    /// Panic with the failure details unless the check passed.
    pub fn unwrap(self) {
        assert!(
            self.passed,
            "{}: {}",
            self.description,
            self.failure_details.unwrap_or_default()
        );
    }
}

fn key_of(doc: &Document, key_fields: &[&str]) -> Option<Vec<i64>> {
    key_fields
        .iter()
        .map(|field| doc.get(*field).and_then(Value::as_i64))
        .collect()
}

/// Index documents by key, ignoring storage-assigned `_id`s.
///
/// Documents missing a key field are left out.
pub fn by_key(docs: &[Document], key_fields: &[&str]) -> BTreeMap<Vec<i64>, Document> {
    docs.iter()
        .filter_map(|doc| {
            let key = key_of(doc, key_fields)?;
            let mut doc = doc.clone();
            doc.remove("_id");
            Some((key, doc))
        })
        .collect()
}

/// Drop documents whose `field` is one of `ids`.
pub fn excluding(docs: &[Document], field: &str, ids: &[i64]) -> Vec<Document> {
    docs.iter()
        .filter(|doc| !doc.get(field).and_then(Value::as_i64).is_some_and(|id| ids.contains(&id)))
        .cloned()
        .collect()
}

/// Assert that `actual` holds exactly the records of `expected`.
///
/// Records are matched by key; every matched pair must be equal.
pub fn assert_converged(expected: &[Document], actual: &[Document], key_fields: &[&str]) -> AssertionResult {
    let expected = by_key(expected, key_fields);
    let actual = by_key(actual, key_fields);

    let missing: Vec<&Vec<i64>> = expected.keys().filter(|k| !actual.contains_key(*k)).collect();
    if !missing.is_empty() {
        return AssertionResult::fail("Convergence check", &format!("missing records {:?}", missing));
    }
    let extra: Vec<&Vec<i64>> = actual.keys().filter(|k| !expected.contains_key(*k)).collect();
    if !extra.is_empty() {
        return AssertionResult::fail("Convergence check", &format!("unexpected records {:?}", extra));
    }
    for (key, doc) in &expected {
        if actual.get(key) != Some(doc) {
            return AssertionResult::fail(
                "Convergence check",
                &format!("record {:?} differs: expected {:?}, got {:?}", key, doc, actual.get(key)),
            );
        }
    }
    AssertionResult::pass(&format!("{} records converged", expected.len()))
}

/// Assert that no two documents share a key.
pub fn assert_unique(docs: &[Document], key_fields: &[&str]) -> AssertionResult {
    let unique = by_key(docs, key_fields).len();
    if unique == docs.len() {
        AssertionResult::pass("Unique keys")
    } else {
        AssertionResult::fail(
            "Unique keys",
            &format!("{} documents but only {} distinct keys", docs.len(), unique),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn converged_ignores_order_and_ids() {
        let expected = vec![doc(json!({"k": 1, "v": "a"})), doc(json!({"k": 2, "v": "b"}))];
        let actual = vec![
            doc(json!({"_id": "x", "k": 2, "v": "b"})),
            doc(json!({"k": 1, "v": "a"})),
        ];
        assert!(assert_converged(&expected, &actual, &["k"]).passed);
    }

    #[test]
    fn converged_reports_missing_extra_and_changed() {
        let expected = vec![doc(json!({"k": 1, "v": "a"}))];

        let missing = assert_converged(&expected, &[], &["k"]);
        assert!(!missing.passed);
        assert!(missing.failure_details.unwrap().contains("missing"));

        let extra = assert_converged(&expected, &[expected[0].clone(), doc(json!({"k": 3}))], &["k"]);
        assert!(extra.failure_details.unwrap().contains("unexpected"));

        let changed = assert_converged(&expected, &[doc(json!({"k": 1, "v": "b"}))], &["k"]);
        assert!(changed.failure_details.unwrap().contains("differs"));
    }

    #[test]
    fn converged_uses_compound_keys() {
        let expected = vec![doc(json!({"a": 1, "b": 2})), doc(json!({"a": 1, "b": 3}))];
        assert!(assert_converged(&expected, &expected, &["a", "b"]).passed);
        assert!(!assert_converged(&expected, &expected[..1], &["a", "b"]).passed);
    }

    #[test]
    fn unique_detects_duplicates() {
        let docs = vec![doc(json!({"k": 1})), doc(json!({"k": 1, "v": 2}))];
        assert!(!assert_unique(&docs, &["k"]).passed);
        assert!(assert_unique(&docs[..1], &["k"]).passed);
    }

    #[test]
    fn excluding_filters_by_field() {
        let docs = vec![doc(json!({"k": 1})), doc(json!({"k": 2})), doc(json!({"x": 1}))];
        assert_eq!(excluding(&docs, "k", &[1]).len(), 2);
    }
}
