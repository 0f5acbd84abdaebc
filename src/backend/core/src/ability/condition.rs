//! Rule conditions.
//!
//! A rule may restrict the resources it applies to with either an attribute
//! match (required field = value pairs) or a custom predicate. Both are
//! evaluated through [`Condition::matches`], so the rule engine never
//! special-cases either kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::models::Resource;
use crate::error::{Result, TollgateError};

/// Out-of-band data supplied by the caller at query time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    /// Token presented by a guest (e.g. an order's guest token).
    pub token: Option<String>,
    /// Any further caller-supplied values.
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying a guest token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            extras: BTreeMap::new(),
        }
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Attribute match
// ═══════════════════════════════════════════════════════════════════════════════

/// Required attribute values, possibly nested through associations.
///
/// Matching rules:
/// - an object value descends into the resource's nested attribute;
/// - an array value matches when the attribute equals any element;
/// - `null` never matches, so an id condition built for a guest is never met;
/// - a missing attribute never matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatch(BTreeMap<String, Value>);

impl AttributeMatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to equal `value`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Build from a JSON object such as `{ "stock_location": { "active": true } }`.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) if map.values().all(|v| !v.is_null()) => {
                Ok(Self(map.into_iter().collect()))
            }
            Value::Object(_) => Err(TollgateError::invalid_condition(
                "Attribute conditions cannot require null",
            )),
            other => Err(TollgateError::invalid_condition(format!(
                "Attribute condition must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn matches(&self, resource: &dyn Resource) -> bool {
        self.0.iter().all(|(name, expected)| {
            resource
                .attribute(name)
                .is_some_and(|actual| value_matches(expected, &actual))
        })
    }
}

fn value_matches(expected: &Value, actual: &Value) -> bool {
    match expected {
        Value::Null => false,
        Value::Object(fields) => match actual {
            Value::Object(nested) => fields.iter().all(|(name, want)| {
                nested
                    .get(name)
                    .is_some_and(|have| value_matches(want, have))
            }),
            _ => false,
        },
        Value::Array(options) => options.iter().any(|option| value_matches(option, actual)),
        scalar => scalar_eq(scalar, actual),
    }
}

/// Scalar equality that treats an integer id and its decimal string as equal,
/// so `"7"` matches `7` in either direction.
pub(crate) fn scalar_eq(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            n.to_string() == *s
        }
        _ => expected == actual,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Predicate
// ═══════════════════════════════════════════════════════════════════════════════

type PredicateFn = dyn Fn(&dyn Resource, &QueryContext) -> bool + Send + Sync;

/// A named custom predicate over a resource and the query context.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn Resource, &QueryContext) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, resource: &dyn Resource, ctx: &QueryContext) -> bool {
        (self.func)(resource, ctx)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Condition
// ═══════════════════════════════════════════════════════════════════════════════

/// Restriction carried by a rule.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Required attribute values.
    Attributes(AttributeMatch),
    /// Arbitrary predicate.
    Predicate(Predicate),
}

impl Condition {
    pub fn attributes(matcher: AttributeMatch) -> Self {
        Self::Attributes(matcher)
    }

    pub fn predicate<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&dyn Resource, &QueryContext) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Predicate::new(name, func))
    }

    /// Evaluate against a resource instance.
    pub fn matches(&self, resource: &dyn Resource, ctx: &QueryContext) -> bool {
        match self {
            Self::Attributes(matcher) => matcher.matches(resource),
            Self::Predicate(predicate) => predicate.evaluate(resource, ctx),
        }
    }

    /// Short description used in rule listings and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Attributes(matcher) => {
                let fields: Vec<String> = matcher
                    .fields()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                format!("where {}", fields.join(", "))
            }
            Self::Predicate(predicate) => format!("if {}", predicate.name()),
        }
    }
}

impl From<AttributeMatch> for Condition {
    fn from(matcher: AttributeMatch) -> Self {
        Self::Attributes(matcher)
    }
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::models::{Record, ResourceType};
    use serde_json::json;

    fn stock_item(active: Value) -> Record {
        Record::new(ResourceType::from_static("stock_item"))
            .with("stock_location", json!({ "active": active }))
    }

    #[test]
    fn test_nested_attribute_match() {
        let cond = AttributeMatch::new().field("stock_location", json!({ "active": true }));
        assert!(cond.matches(&stock_item(json!(true))));
        assert!(!cond.matches(&stock_item(json!(false))));
    }

    #[test]
    fn test_missing_attribute_is_not_satisfied() {
        let cond = AttributeMatch::new().field("user_id", "u1");
        let card = Record::new(ResourceType::from_static("credit_card"));
        assert!(!cond.matches(&card));
    }

    #[test]
    fn test_null_expectation_never_matches() {
        let cond = AttributeMatch::new().field("user_id", Value::Null);
        let card =
            Record::new(ResourceType::from_static("credit_card")).with("user_id", Value::Null);
        assert!(!cond.matches(&card));
    }

    #[test]
    fn test_array_expectation_is_membership() {
        let cond = AttributeMatch::new().field("state", json!(["cart", "address"]));
        let order = Record::new(ResourceType::from_static("order")).with("state", "address");
        assert!(cond.matches(&order));
        let done = Record::new(ResourceType::from_static("order")).with("state", "complete");
        assert!(!cond.matches(&done));
    }

    #[test]
    fn test_empty_match_is_satisfied() {
        let record = Record::new(ResourceType::from_static("zone"));
        assert!(AttributeMatch::new().matches(&record));
    }

    #[test]
    fn test_predicate_condition_sees_context() {
        let cond = Condition::predicate("token matches", |resource, ctx| {
            let token = resource.attribute("guest_token");
            match (token, ctx.token.as_deref()) {
                (Some(Value::String(have)), Some(given)) => have == given,
                _ => false,
            }
        });
        let order = Record::new(ResourceType::from_static("order")).with("guest_token", "abc");

        assert!(cond.matches(&order, &QueryContext::with_token("abc")));
        assert!(!cond.matches(&order, &QueryContext::with_token("xyz")));
        assert!(!cond.matches(&order, &QueryContext::new()));
    }

    #[test]
    fn test_from_json() {
        let matcher =
            AttributeMatch::from_json(json!({ "stock_location": { "active": true } })).unwrap();
        let item = Record::new(ResourceType::from_static("stock_item"))
            .with("stock_location", json!({ "active": true }));
        assert!(matcher.matches(&item));
    }

    #[test]
    fn test_from_json_rejects_non_objects_and_nulls() {
        let err = AttributeMatch::from_json(json!("active")).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidCondition);

        let err = AttributeMatch::from_json(json!({ "user_id": null })).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidCondition);
    }

    #[test]
    fn test_numeric_and_string_ids_compare_equal() {
        let card = Record::new(ResourceType::from_static("credit_card")).with("user_id", 7);
        assert!(AttributeMatch::new().field("user_id", "7").matches(&card));
        assert!(!AttributeMatch::new().field("user_id", "8").matches(&card));

        let card = Record::new(ResourceType::from_static("credit_card")).with("user_id", "7");
        assert!(AttributeMatch::new().field("user_id", 7).matches(&card));

        let padded = Record::new(ResourceType::from_static("credit_card")).with("user_id", 7);
        assert!(!AttributeMatch::new().field("user_id", "07").matches(&padded));
    }

    #[test]
    fn test_describe() {
        let cond = Condition::from(AttributeMatch::new().field("active", true));
        assert_eq!(cond.describe(), "where active=true");
        let pred = Condition::predicate("owner", |_, _| true);
        assert_eq!(pred.describe(), "if owner");
    }
}
