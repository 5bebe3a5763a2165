//! State diffing - the added/removed/modified partition between two states.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CanvasElement, CanvasState};

/// Per-element property changes between two states.
///
/// `before` and `after` are partial views carrying only the keys that differ.
/// A key present in `before` but absent from `after` was removed from the
/// element, and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementChange {
    /// The element whose properties changed.
    pub id: String,
    /// Old values of the differing keys.
    pub before: BTreeMap<String, Value>,
    /// New values of the differing keys.
    pub after: BTreeMap<String, Value>,
}

/// The computed difference between two canvas states.
///
/// Diagnostic only: the full `canvas_state` on each entry stays authoritative,
/// a delta is always re-derivable from consecutive entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    /// Elements present only in the `after` state.
    pub added: Vec<CanvasElement>,
    /// IDs of elements present only in the `before` state.
    pub removed: Vec<String>,
    /// Elements present in both states with at least one differing property.
    pub modified: Vec<ElementChange>,
}

impl StateDelta {
    /// Check whether the delta records no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// All element IDs touched by this delta.
    #[must_use]
    pub fn changed_ids(&self) -> Vec<String> {
        self.added
            .iter()
            .map(|e| e.id.clone())
            .chain(self.removed.iter().cloned())
            .chain(self.modified.iter().map(|c| c.id.clone()))
            .collect()
    }
}

/// Compute the added/removed/modified partition between two states.
///
/// Pure and O(n) via hashed id lookups. Elements are matched by `id`; matched
/// pairs are compared per-property over the union of their keys (typed
/// geometry, the type tag, and the open map). Ordering of the output follows
/// document order: `added` in `after` order, `removed` and `modified` in
/// `before` order.
#[must_use]
pub fn compute_delta(before: &CanvasState, after: &CanvasState) -> StateDelta {
    let before_ids: HashMap<&str, &CanvasElement> = before
        .elements
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();
    let after_ids: HashMap<&str, &CanvasElement> = after
        .elements
        .iter()
        .map(|e| (e.id.as_str(), e))
        .collect();

    let added = after
        .elements
        .iter()
        .filter(|e| !before_ids.contains_key(e.id.as_str()))
        .cloned()
        .collect();

    let removed = before
        .elements
        .iter()
        .filter(|e| !after_ids.contains_key(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();

    let modified = before
        .elements
        .iter()
        .filter_map(|b| after_ids.get(b.id.as_str()).and_then(|a| diff_element(b, a)))
        .collect();

    StateDelta {
        added,
        removed,
        modified,
    }
}

/// Diff one matched element pair; `None` when no property differs.
fn diff_element(before: &CanvasElement, after: &CanvasElement) -> Option<ElementChange> {
    let mut old = BTreeMap::new();
    let mut new = BTreeMap::new();

    if before.kind != after.kind {
        old.insert("type".to_string(), Value::String(before.kind.clone()));
        new.insert("type".to_string(), Value::String(after.kind.clone()));
    }

    // Geometry compares bitwise so NaN is stable (NaN == NaN, NaN != 0.0).
    let geometry = [
        ("x", before.x, after.x),
        ("y", before.y, after.y),
        ("width", before.width, after.width),
        ("height", before.height, after.height),
    ];
    for (key, b, a) in geometry {
        if b.to_bits() != a.to_bits() {
            old.insert(key.to_string(), number_value(b));
            new.insert(key.to_string(), number_value(a));
        }
    }

    // Open map: a missing key, an explicit null, and any concrete value are
    // three distinct diff outcomes.
    let keys: BTreeSet<&String> = before.props.keys().chain(after.props.keys()).collect();
    for key in keys {
        match (before.props.get(key), after.props.get(key)) {
            (Some(b), Some(a)) if b == a => {}
            (Some(b), Some(a)) => {
                old.insert(key.clone(), b.clone());
                new.insert(key.clone(), a.clone());
            }
            (Some(b), None) => {
                old.insert(key.clone(), b.clone());
            }
            (None, Some(a)) => {
                new.insert(key.clone(), a.clone());
            }
            (None, None) => {}
        }
    }

    if old.is_empty() && new.is_empty() {
        None
    } else {
        Some(ElementChange {
            id: before.id.clone(),
            before: old,
            after: new,
        })
    }
}

/// Encode an f64 for a partial; non-finite values are recorded as null.
fn number_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rect(id: &str) -> CanvasElement {
        CanvasElement::new(id, "rect")
    }

    #[test]
    fn test_identical_states_yield_empty_delta() {
        let state = CanvasState::with_elements(vec![
            rect("a").with_prop("fill", json!("#fff")),
            rect("b"),
        ]);
        let delta = compute_delta(&state, &state);
        assert!(delta.is_empty());
        assert!(delta.changed_ids().is_empty());
    }

    #[test]
    fn test_added_removed_modified_partition() {
        let before = CanvasState::with_elements(vec![
            rect("f"),
            rect("g").with_prop("fill", json!("#000")),
        ]);
        let after = CanvasState::with_elements(vec![
            rect("g").with_prop("fill", json!("#fff")),
            rect("e"),
        ]);

        let delta = compute_delta(&before, &after);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].id, "e");
        assert_eq!(delta.removed, vec!["f".to_string()]);
        assert_eq!(delta.modified.len(), 1);

        let change = &delta.modified[0];
        assert_eq!(change.id, "g");
        assert_eq!(change.before.get("fill"), Some(&json!("#000")));
        assert_eq!(change.after.get("fill"), Some(&json!("#fff")));
        assert_eq!(change.before.len(), 1);
        assert_eq!(change.after.len(), 1);
    }

    #[test]
    fn test_geometry_change() {
        let before = CanvasState::with_elements(vec![rect("a").with_position(10.0, 20.0)]);
        let after = CanvasState::with_elements(vec![rect("a").with_position(30.0, 20.0)]);

        let delta = compute_delta(&before, &after);
        let change = &delta.modified[0];
        assert_eq!(change.before.get("x"), Some(&json!(10.0)));
        assert_eq!(change.after.get("x"), Some(&json!(30.0)));
        assert!(!change.before.contains_key("y"));
    }

    #[test]
    fn test_type_tag_change() {
        let before = CanvasState::with_elements(vec![CanvasElement::new("a", "rect")]);
        let after = CanvasState::with_elements(vec![CanvasElement::new("a", "ellipse")]);

        let delta = compute_delta(&before, &after);
        let change = &delta.modified[0];
        assert_eq!(change.before.get("type"), Some(&json!("rect")));
        assert_eq!(change.after.get("type"), Some(&json!("ellipse")));
    }

    #[test]
    fn test_nan_geometry_is_stable() {
        let state = CanvasState::with_elements(vec![rect("a").with_position(f64::NAN, 0.0)]);
        let delta = compute_delta(&state, &state.clone());
        assert!(delta.is_empty());

        let moved = CanvasState::with_elements(vec![rect("a").with_position(0.0, 0.0)]);
        let delta = compute_delta(&state, &moved);
        assert_eq!(delta.modified.len(), 1);
        // NaN has no JSON number encoding; the partial records null.
        assert_eq!(delta.modified[0].before.get("x"), Some(&Value::Null));
    }

    #[test]
    fn test_null_and_missing_are_distinct() {
        let with_null =
            CanvasState::with_elements(vec![rect("a").with_prop("locked", Value::Null)]);
        let without = CanvasState::with_elements(vec![rect("a")]);

        let delta = compute_delta(&with_null, &without);
        assert_eq!(delta.modified.len(), 1);
        let change = &delta.modified[0];
        assert_eq!(change.before.get("locked"), Some(&Value::Null));
        assert!(!change.after.contains_key("locked"));
    }

    #[test]
    fn test_removed_key_appears_only_in_before() {
        let before = CanvasState::with_elements(vec![rect("a").with_prop("fill", json!("#fff"))]);
        let after = CanvasState::with_elements(vec![rect("a")]);

        let delta = compute_delta(&before, &after);
        let change = &delta.modified[0];
        assert_eq!(change.before.get("fill"), Some(&json!("#fff")));
        assert!(change.after.is_empty());
    }
}
