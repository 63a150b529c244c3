//! Canonical grouping and flattening of onboarding answers.
//!
//! Raw submissions arrive keyed by step with whatever casing the client used
//! (`teamSize`, `team_size`, `team-size`). Known step keys are folded into
//! their hyphenated canonical form, nested object keys are sorted, and the
//! result is flattened into dotted paths for aggregation.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::domain::canonical_json::{canonicalize, to_canonical_string};

/// Flattened answers: dotted path to ordered string values.
pub type FlatAnswers = BTreeMap<String, Vec<String>>;

/// Onboarding steps with a canonical hyphenated key.
pub const KNOWN_STEPS: [&str; 8] = [
    "profile",
    "team",
    "team-size",
    "work-style",
    "primary-goals",
    "tools",
    "communication-preferences",
    "workspace-setup",
];

/// Canonical key for a raw step key.
///
/// Keys whose kebab-case form names a known step map to that step; any other
/// key is returned unchanged.
///
/// # Examples
/// ```
/// use tenant_scope::domain::onboarding::canonical_step_key;
///
/// assert_eq!(canonical_step_key("teamSize"), "team-size");
/// assert_eq!(canonical_step_key("primary_goals"), "primary-goals");
/// assert_eq!(canonical_step_key("customStep"), "customStep");
/// ```
#[must_use]
pub fn canonical_step_key(raw: &str) -> String {
    let kebab = to_kebab_case(raw);
    if KNOWN_STEPS.contains(&kebab.as_str()) {
        kebab
    } else {
        raw.to_owned()
    }
}

fn to_kebab_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut previous_lower = false;
    for ch in raw.trim().chars() {
        match ch {
            '_' | '-' | ' ' => {
                if !out.ends_with('-') && !out.is_empty() {
                    out.push('-');
                }
                previous_lower = false;
            }
            upper if upper.is_ascii_uppercase() => {
                if previous_lower && !out.ends_with('-') {
                    out.push('-');
                }
                out.push(upper.to_ascii_lowercase());
                previous_lower = false;
            }
            other => {
                out.push(other);
                previous_lower = other.is_ascii_lowercase() || other.is_ascii_digit();
            }
        }
    }
    out
}

/// Fold step-key aliases and sort keys recursively.
///
/// Lists keep their order; only the objects inside them have their keys
/// sorted. When two raw keys fold into the same canonical key, the one that
/// sorts last wins.
#[must_use]
pub fn normalize_answer_groups(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut ordered: Vec<_> = raw.iter().collect();
    ordered.sort_by_key(|(key, _)| key.as_str());

    let mut grouped = BTreeMap::new();
    for (key, value) in ordered {
        grouped.insert(canonical_step_key(key), canonicalize(value));
    }
    grouped.into_iter().collect()
}

/// Flatten canonical answer groups into dotted paths.
///
/// - Scalars become one-element lists; booleans render as `true`/`false`
///   and null as the empty string.
/// - Arrays become one value per element; object or array elements render
///   as canonical JSON text instead of being walked.
/// - Empty arrays keep their path with no values; empty objects contribute
///   nothing.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use tenant_scope::domain::onboarding::flatten_answer_groups;
///
/// let groups = json!({"tools": {"selected": ["git", "slack"]}});
/// let flat = flatten_answer_groups(groups.as_object().unwrap());
/// assert_eq!(flat["tools.selected"], vec!["git", "slack"]);
/// ```
#[must_use]
pub fn flatten_answer_groups(groups: &Map<String, Value>) -> FlatAnswers {
    let mut flat = FlatAnswers::new();
    for (key, value) in groups {
        flatten_into(&mut flat, key.clone(), value);
    }
    flat
}

fn flatten_into(flat: &mut FlatAnswers, path: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(flat, format!("{path}.{key}"), nested);
            }
        }
        Value::Array(items) => {
            flat.insert(path, items.iter().map(stringify_element).collect());
        }
        scalar => {
            flat.insert(path, vec![stringify_scalar(scalar)]);
        }
    }
}

fn stringify_element(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => to_canonical_string(value),
        scalar => stringify_scalar(scalar),
    }
}

fn stringify_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => to_canonical_string(value),
    }
}

/// Distinct `(key, value)` pairs of one snapshot.
///
/// A value repeated inside one list counts once, matching the totals rule
/// that a snapshot contributes at most one to each pair.
#[must_use]
pub fn answer_pairs(flat: &FlatAnswers) -> BTreeSet<(String, String)> {
    flat.iter()
        .flat_map(|(key, values)| values.iter().map(move |value| (key.clone(), value.clone())))
        .collect()
}

/// Totals adjustment for replacing one snapshot's answers with another's.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TotalsDelta {
    /// Pairs to decrement, floored at zero.
    pub removed: BTreeSet<(String, String)>,
    /// Pairs to increment.
    pub added: BTreeSet<(String, String)>,
}

impl TotalsDelta {
    /// Delta between the previous answers (if any) and the new answers.
    ///
    /// Pairs present in both are left out, so their totals stay untouched.
    ///
    /// # Examples
    /// ```
    /// use tenant_scope::domain::onboarding::{FlatAnswers, TotalsDelta};
    ///
    /// let old = FlatAnswers::from([("profile.role".into(), vec!["engineer".into()])]);
    /// let new = FlatAnswers::from([("profile.role".into(), vec!["manager".into()])]);
    /// let delta = TotalsDelta::between(Some(&old), &new);
    /// assert!(delta.removed.contains(&("profile.role".into(), "engineer".into())));
    /// assert!(delta.added.contains(&("profile.role".into(), "manager".into())));
    /// ```
    #[must_use]
    pub fn between(previous: Option<&FlatAnswers>, current: &FlatAnswers) -> Self {
        let before = previous.map(answer_pairs).unwrap_or_default();
        let after = answer_pairs(current);
        Self {
            removed: before.difference(&after).cloned().collect(),
            added: after.difference(&before).cloned().collect(),
        }
    }

    /// Whether applying the delta changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}
