//! World-state model: typed facts, constraints, effects and the planning
//! heuristic.
//!
//! [`WorldState`] is a plain value used for snapshots and search nodes.
//! [`WorldStateStore`] wraps the single live copy owned by an orchestrator;
//! every write to it happens under one lock, so a multi-key update is never
//! observed half-applied.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::GoapResult;

const NUMERIC_EPSILON: f64 = 1e-9;

/// A single fact value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, f64>),
}

impl Value {
    /// Build a list value from anything yielding string-like items.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Numeric coercion used by comparison constraints.
    ///
    /// Lists coerce to their length and maps to the sum of their values.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::List(items) => Some(items.len() as f64),
            Value::Map(entries) => Some(entries.values().sum()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, f64>> for Value {
    fn from(value: BTreeMap<String, f64>) -> Self {
        Value::Map(value)
    }
}

/// Comparison operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        };
        write!(f, "{s}")
    }
}

/// A requirement on one fact: either an exact literal or a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraint {
    Compare { operator: Operator, value: Value },
    Literal(Value),
}

impl Constraint {
    pub fn literal(value: impl Into<Value>) -> Self {
        Constraint::Literal(value.into())
    }

    pub fn compare(operator: Operator, value: impl Into<Value>) -> Self {
        Constraint::Compare {
            operator,
            value: value.into(),
        }
    }

    /// Whether `actual` meets this constraint.
    pub fn is_met(&self, actual: &Value) -> bool {
        match self {
            Constraint::Literal(expected) => actual == expected,
            Constraint::Compare { operator, value } => {
                let numeric = actual.as_number().zip(value.as_number());
                match (operator, numeric) {
                    (Operator::Eq, Some((a, b))) => (a - b).abs() < NUMERIC_EPSILON,
                    (Operator::Eq, None) => actual == value,
                    (Operator::Ne, Some((a, b))) => (a - b).abs() >= NUMERIC_EPSILON,
                    (Operator::Ne, None) => actual != value,
                    (Operator::Lt, Some((a, b))) => a < b,
                    (Operator::Le, Some((a, b))) => a <= b,
                    (Operator::Gt, Some((a, b))) => a > b,
                    (Operator::Ge, Some((a, b))) => a >= b,
                    (_, None) => false,
                }
            }
        }
    }

    /// Normalized numeric gap in `[0, 1]` between `actual` and the target.
    ///
    /// Non-numeric comparisons report zero; callers only use this for unmet
    /// constraints, which already carry a base weight of one.
    fn gap(&self, actual: &Value) -> f64 {
        let target = match self {
            Constraint::Literal(v) => v,
            Constraint::Compare { value, .. } => value,
        };
        match actual.as_number().zip(target.as_number()) {
            Some((a, b)) => {
                let scale = a.abs().max(b.abs()).max(1.0);
                ((a - b).abs() / scale).min(1.0)
            }
            None => 0.0,
        }
    }
}

/// Constraints keyed by fact name, as used by goals and preconditions.
pub type Conditions = BTreeMap<String, Constraint>;

/// A change to one fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Replace the value wholesale.
    Set(Value),
    /// Add to a number; a negative delta on a list drops items from the front.
    Delta(f64),
    /// Append to a list, creating it if absent.
    Push(String),
    /// Remove an item from a list, or a key from a map.
    Remove(String),
    /// Forget the fact entirely.
    Unset,
}

impl Effect {
    pub fn set(value: impl Into<Value>) -> Self {
        Effect::Set(value.into())
    }

    fn apply_to(&self, facts: &mut BTreeMap<String, Value>, key: &str) {
        match self {
            Effect::Set(value) => {
                facts.insert(key.to_string(), value.clone());
            }
            Effect::Delta(delta) => match facts.get_mut(key) {
                Some(Value::Number(n)) => *n += delta,
                Some(Value::List(items)) if *delta < 0.0 => {
                    let drop = (delta.abs().round() as usize).min(items.len());
                    items.drain(..drop);
                }
                Some(_) => {}
                None => {
                    facts.insert(key.to_string(), Value::Number(*delta));
                }
            },
            Effect::Push(item) => match facts.get_mut(key) {
                Some(Value::List(items)) => items.push(item.clone()),
                Some(_) => {}
                None => {
                    facts.insert(key.to_string(), Value::List(vec![item.clone()]));
                }
            },
            Effect::Remove(item) => match facts.get_mut(key) {
                Some(Value::List(items)) => {
                    if let Some(pos) = items.iter().position(|i| i == item) {
                        items.remove(pos);
                    }
                }
                Some(Value::Map(entries)) => {
                    entries.remove(item);
                }
                _ => {}
            },
            Effect::Unset => {
                facts.remove(key);
            }
        }
    }
}

/// A set of effects keyed by fact name.
pub type StateDelta = BTreeMap<String, Effect>;

/// An immutable-by-convention set of facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState {
    facts: BTreeMap<String, Value>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.facts.insert(key.into(), value.into());
    }

    pub fn facts(&self) -> &BTreeMap<String, Value> {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Shallow merge: every key in `partial` replaces the current value.
    pub fn merge(&mut self, partial: WorldState) {
        self.facts.extend(partial.facts);
    }

    pub fn apply(&mut self, delta: &StateDelta) {
        for (key, effect) in delta {
            effect.apply_to(&mut self.facts, key);
        }
    }

    pub fn satisfies(&self, constraints: &Conditions) -> bool {
        satisfies(self, constraints)
    }

    pub fn distance(&self, constraints: &Conditions) -> f64 {
        distance(self, constraints)
    }

    /// Keys whose constraint is absent or unmet, in key order.
    pub fn unmet_keys(&self, constraints: &Conditions) -> Vec<String> {
        constraints
            .iter()
            .filter(|(key, c)| !self.facts.get(*key).is_some_and(|v| c.is_met(v)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// SHA-256 hex digest of the canonical JSON encoding.
    ///
    /// Facts live in a `BTreeMap`, so equal states always encode identically.
    pub fn fingerprint(&self) -> GoapResult<String> {
        use sha2::Digest as _;
        let bytes = serde_json::to_vec(&self.facts)?;
        Ok(hex::encode(sha2::Sha256::digest(&bytes)))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for WorldState {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            facts: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// `false` as soon as any constrained key is absent or unmet.
pub fn satisfies(state: &WorldState, constraints: &Conditions) -> bool {
    constraints
        .iter()
        .all(|(key, c)| state.get(key).is_some_and(|v| c.is_met(v)))
}

/// Planning heuristic: each unmet constraint contributes `1 + gap`, where the
/// gap is the normalized numeric distance to the target.
///
/// Zero exactly when [`satisfies`] holds.
pub fn distance(state: &WorldState, constraints: &Conditions) -> f64 {
    constraints
        .iter()
        .map(|(key, c)| match state.get(key) {
            Some(v) if c.is_met(v) => 0.0,
            Some(v) => 1.0 + c.gap(v),
            None => 1.0,
        })
        .sum()
}

/// The live world state shared by all running plans.
#[derive(Debug, Default)]
pub struct WorldStateStore {
    state: RwLock<WorldState>,
}

impl WorldStateStore {
    pub fn new(initial: WorldState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read(|s| s.get(key).cloned())
    }

    /// Shallow-merge `partial` into the live state in one write.
    pub fn update(&self, partial: WorldState) {
        self.write(|s| s.merge(partial));
    }

    /// Apply a runtime delta in one write.
    pub fn apply(&self, delta: &StateDelta) {
        if delta.is_empty() {
            return;
        }
        self.write(|s| s.apply(delta));
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> WorldState {
        self.read(WorldState::clone)
    }

    pub fn satisfies(&self, constraints: &Conditions) -> bool {
        self.read(|s| s.satisfies(constraints))
    }

    pub fn unmet_keys(&self, constraints: &Conditions) -> Vec<String> {
        self.read(|s| s.unmet_keys(constraints))
    }

    fn read<T>(&self, f: impl FnOnce(&WorldState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    fn write(&self, f: impl FnOnce(&mut WorldState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders(items: &[&str]) -> WorldState {
        WorldState::new()
            .with("orders_in_queue", Value::list(items.iter().copied()))
            .with("staff_available", true)
    }

    fn queue_empty() -> Conditions {
        Conditions::from([(
            "orders_in_queue".to_string(),
            Constraint::compare(Operator::Lt, 1),
        )])
    }

    #[test]
    fn test_absent_key_never_satisfies() {
        let state = WorldState::new().with("staff_available", true);
        let constraints = Conditions::from([(
            "equipment_available".to_string(),
            Constraint::literal(false),
        )]);
        assert!(!satisfies(&state, &constraints));
        assert!(distance(&state, &constraints) > 0.0);
    }

    #[test]
    fn test_explicit_false_is_distinct_from_absent() {
        let state = WorldState::new().with("equipment_available", false);
        let constraints = Conditions::from([(
            "equipment_available".to_string(),
            Constraint::literal(false),
        )]);
        assert!(satisfies(&state, &constraints));
        assert_eq!(distance(&state, &constraints), 0.0);
    }

    #[test]
    fn test_list_coerces_to_length_for_comparison() {
        assert!(!orders(&["A", "B", "C"]).satisfies(&queue_empty()));
        assert!(orders(&[]).satisfies(&queue_empty()));
    }

    #[test]
    fn test_map_coerces_to_sum() {
        let state = WorldState::new().with(
            "stock",
            BTreeMap::from([("widgets".to_string(), 4.0), ("bolts".to_string(), 6.0)]),
        );
        let constraints =
            Conditions::from([("stock".to_string(), Constraint::compare(Operator::Ge, 10))]);
        assert!(state.satisfies(&constraints));
    }

    #[test]
    fn test_eq_on_text_falls_back_to_structural_equality() {
        let state = WorldState::new().with("zone", "north");
        let eq = Conditions::from([("zone".to_string(), Constraint::compare(Operator::Eq, "north"))]);
        let ne = Conditions::from([("zone".to_string(), Constraint::compare(Operator::Ne, "south"))]);
        let lt = Conditions::from([("zone".to_string(), Constraint::compare(Operator::Lt, "zzz"))]);
        assert!(state.satisfies(&eq));
        assert!(state.satisfies(&ne));
        assert!(!state.satisfies(&lt));
    }

    #[test]
    fn test_distance_zero_iff_satisfied() {
        let constraints = queue_empty();
        for items in [&["A", "B", "C"][..], &["A"][..], &[][..]] {
            let state = orders(items);
            assert_eq!(
                state.distance(&constraints) == 0.0,
                state.satisfies(&constraints),
                "mismatch for {items:?}"
            );
        }
    }

    #[test]
    fn test_distance_grows_with_numeric_gap() {
        let constraints = queue_empty();
        let far = orders(&["A", "B", "C", "D", "E"]).distance(&constraints);
        let near = orders(&["A"]).distance(&constraints);
        assert!(far > near);
        assert!(near >= 1.0);
    }

    #[test]
    fn test_negative_delta_pops_list_front() {
        let mut state = orders(&["A", "B", "C"]);
        state.apply(&StateDelta::from([(
            "orders_in_queue".to_string(),
            Effect::Delta(-1.0),
        )]));
        assert_eq!(state.get("orders_in_queue"), Some(&Value::list(["B", "C"])));
    }

    #[test]
    fn test_delta_on_absent_key_starts_from_zero() {
        let mut state = WorldState::new();
        state.apply(&StateDelta::from([("trucks_loaded".to_string(), Effect::Delta(2.0))]));
        assert_eq!(state.get("trucks_loaded"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_push_remove_and_unset() {
        let mut state = WorldState::new();
        state.apply(&StateDelta::from([("docks".to_string(), Effect::Push("d1".to_string()))]));
        state.apply(&StateDelta::from([("docks".to_string(), Effect::Push("d2".to_string()))]));
        state.apply(&StateDelta::from([("docks".to_string(), Effect::Remove("d1".to_string()))]));
        assert_eq!(state.get("docks"), Some(&Value::list(["d2"])));

        state.apply(&StateDelta::from([("docks".to_string(), Effect::Unset)]));
        assert!(state.get("docks").is_none());
    }

    #[test]
    fn test_merge_replaces_lists_wholesale() {
        let mut state = orders(&["A", "B"]);
        state.merge(WorldState::new().with("orders_in_queue", Value::list(["Z"])));
        assert_eq!(state.get("orders_in_queue"), Some(&Value::list(["Z"])));
        assert_eq!(state.get("staff_available"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = orders(&["A"]).fingerprint().unwrap();
        let b = orders(&["A"]).fingerprint().unwrap();
        let c = orders(&["B"]).fingerprint().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_constraint_deserializes_literal_and_comparison() {
        let parsed: Conditions = serde_json::from_value(serde_json::json!({
            "orders_in_queue": { "operator": "<", "value": 1 },
            "staff_available": true,
            "stock": { "widgets": 3 }
        }))
        .unwrap();
        assert_eq!(
            parsed["orders_in_queue"],
            Constraint::compare(Operator::Lt, 1)
        );
        assert_eq!(parsed["staff_available"], Constraint::literal(true));
        assert!(matches!(parsed["stock"], Constraint::Literal(Value::Map(_))));
    }

    #[test]
    fn test_store_snapshot_is_isolated_from_live_state() {
        let store = WorldStateStore::new(orders(&["A"]));
        let mut snap = store.snapshot();
        snap.insert("staff_available", false);
        assert_eq!(store.get("staff_available"), Some(Value::Bool(true)));
    }
}
