//! Ability data models: user identity, roles, resource types and resources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON form used when comparing against resource attributes.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Strongly-typed role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleName(pub String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// User
// ═══════════════════════════════════════════════════════════════════════════════

/// The user an ability is built for.
///
/// Anonymous visitors are represented by [`User::guest`], never by a missing
/// value: a guest has no id and no roles, so id-based conditions are still
/// well-defined (and never satisfied).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Persistent identity, `None` for guests.
    pub id: Option<UserId>,
    /// Roles held by the user.
    #[serde(default)]
    pub roles: BTreeSet<RoleName>,
}

impl User {
    /// Create a registered user with no roles.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: Some(id.into()),
            roles: BTreeSet::new(),
        }
    }

    /// The anonymous guest user.
    pub fn guest() -> Self {
        Self::default()
    }

    /// Add a role.
    pub fn with_role(mut self, role: impl Into<RoleName>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }

    pub fn is_guest(&self) -> bool {
        self.id.is_none()
    }

    /// The user id as a JSON value, `null` for guests.
    pub fn id_value(&self) -> Value {
        self.id.as_ref().map_or(Value::Null, UserId::to_value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════════════

/// Name of a protected resource type (e.g. `order`, `product`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    /// Const constructor for well-known types.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

/// A resource instance that rules are evaluated against.
///
/// Attributes are exposed as JSON values; associations (an order's owner, a
/// stock item's location) are nested objects.
pub trait Resource: Send + Sync {
    /// The type the resource belongs to.
    fn resource_type(&self) -> ResourceType;

    /// Look up one attribute. `None` when the resource has no such attribute.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Follow a dotted path (`order.user_id`) through nested objects.
    fn attribute_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.attribute(first)?;
        for segment in segments {
            current = current.get(segment)?.clone();
        }
        Some(current)
    }
}

/// A generic [`Resource`] backed by a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    resource_type: ResourceType,
    attributes: Map<String, Value>,
}

impl Record {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            attributes: Map::new(),
        }
    }

    /// Build a record from a JSON value; non-object values yield an empty record.
    pub fn from_json(resource_type: ResourceType, value: Value) -> Self {
        let attributes = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type,
            attributes,
        }
    }

    /// Set an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl Resource for Record {
    fn resource_type(&self) -> ResourceType {
        self.resource_type.clone()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guest_has_no_identity() {
        let guest = User::guest();
        assert!(guest.is_guest());
        assert!(guest.roles.is_empty());
        assert_eq!(guest.id_value(), Value::Null);
    }

    #[test]
    fn test_user_roles() {
        let user = User::new("u1").with_role("admin");
        assert!(user.has_role("admin"));
        assert!(!user.has_role("clerk"));
        assert_eq!(user.id_value(), json!("u1"));
    }

    #[test]
    fn test_record_attribute_path() {
        let item = Record::new(ResourceType::from_static("stock_item"))
            .with("stock_location", json!({ "active": true, "name": "east" }));

        assert_eq!(item.attribute_path("stock_location.active"), Some(json!(true)));
        assert_eq!(item.attribute_path("stock_location.missing"), None);
        assert_eq!(item.attribute_path("nothing"), None);
    }

    #[test]
    fn test_record_from_non_object() {
        let record = Record::from_json(ResourceType::from_static("order"), json!([1, 2]));
        assert!(record.attributes().is_empty());
    }

    #[test]
    fn test_resource_type_equality() {
        assert_eq!(ResourceType::from_static("order"), ResourceType::new("order"));
        assert_eq!(ResourceType::from("zone").to_string(), "zone");
    }
}
