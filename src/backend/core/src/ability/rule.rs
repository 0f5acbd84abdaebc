//! Permission rules and ordered rule sets.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use super::action::Action;
use super::condition::{scalar_eq, AttributeMatch, Condition, QueryContext};
use super::models::{Resource, ResourceType};

// ═══════════════════════════════════════════════════════════════════════════════
// Subjects and targets
// ═══════════════════════════════════════════════════════════════════════════════

/// Resource types a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subjects {
    /// Every resource type.
    All,
    /// The listed types only.
    Types(BTreeSet<ResourceType>),
}

impl Subjects {
    pub fn includes(&self, resource_type: &ResourceType) -> bool {
        match self {
            Self::All => true,
            Self::Types(types) => types.contains(resource_type),
        }
    }
}

impl fmt::Display for Subjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Types(types) => {
                let names: Vec<&str> = types.iter().map(ResourceType::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

impl From<ResourceType> for Subjects {
    fn from(resource_type: ResourceType) -> Self {
        Self::Types(BTreeSet::from([resource_type]))
    }
}

impl<const N: usize> From<[ResourceType; N]> for Subjects {
    fn from(types: [ResourceType; N]) -> Self {
        Self::Types(types.into_iter().collect())
    }
}

impl From<Vec<ResourceType>> for Subjects {
    fn from(types: Vec<ResourceType>) -> Self {
        Self::Types(types.into_iter().collect())
    }
}

/// What a query asks about: a whole resource type or one instance.
#[derive(Clone, Copy)]
pub enum Target<'a> {
    /// Type-level check. Conditions are not evaluated; any relevant rule
    /// answers yes.
    Type(&'a ResourceType),
    /// Instance check. Conditions are evaluated against the resource.
    Instance(&'a dyn Resource),
}

impl<'a> Target<'a> {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Type(t) => (*t).clone(),
            Self::Instance(r) => r.resource_type(),
        }
    }
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => f.debug_tuple("Type").field(t).finish(),
            Self::Instance(r) => f.debug_tuple("Instance").field(&r.resource_type()).finish(),
        }
    }
}

impl<'a> From<&'a ResourceType> for Target<'a> {
    fn from(resource_type: &'a ResourceType) -> Self {
        Self::Type(resource_type)
    }
}

impl<'a> From<&'a dyn Resource> for Target<'a> {
    fn from(resource: &'a dyn Resource) -> Self {
        Self::Instance(resource)
    }
}

impl<'a> From<&'a super::models::Record> for Target<'a> {
    fn from(record: &'a super::models::Record) -> Self {
        Self::Instance(record)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rule
// ═══════════════════════════════════════════════════════════════════════════════

/// One allow grant: actions × subjects, optionally restricted by a condition.
#[derive(Debug, Clone)]
pub struct Rule {
    actions: BTreeSet<Action>,
    subjects: Subjects,
    condition: Option<Condition>,
}

impl Rule {
    pub fn new<I>(actions: I, subjects: impl Into<Subjects>) -> Self
    where
        I: IntoIterator<Item = Action>,
    {
        Self {
            actions: actions.into_iter().collect(),
            subjects: subjects.into(),
            condition: None,
        }
    }

    /// `manage` on `all`.
    pub fn manage_all() -> Self {
        Self::new([Action::MANAGE], Subjects::All)
    }

    /// Restrict by a condition. A rule carries at most one; the last one set wins.
    pub fn with_condition(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Restrict to resources whose attributes match.
    pub fn where_attributes(self, matcher: AttributeMatch) -> Self {
        self.with_condition(Condition::Attributes(matcher))
    }

    /// Restrict by a named predicate.
    pub fn when<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn Resource, &QueryContext) -> bool + Send + Sync + 'static,
    {
        self.with_condition(Condition::predicate(name, predicate))
    }

    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Whether the rule speaks about any of `requested` actions on `resource_type`.
    pub fn is_relevant(&self, requested: &BTreeSet<Action>, resource_type: &ResourceType) -> bool {
        let action_match = self.actions.iter().any(Action::is_manage)
            || requested.iter().any(|a| self.actions.contains(a));
        action_match && self.subjects.includes(resource_type)
    }

    /// Whether the rule grants any of `requested` actions on `target`.
    pub fn allows(
        &self,
        requested: &BTreeSet<Action>,
        target: &Target<'_>,
        ctx: &QueryContext,
    ) -> bool {
        if !self.is_relevant(requested, &target.resource_type()) {
            return false;
        }
        match (target, &self.condition) {
            (Target::Type(_), _) | (_, None) => true,
            (Target::Instance(resource), Some(condition)) => condition.matches(*resource, ctx),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(Action::as_str).collect();
        write!(f, "can {} on {}", actions.join(","), self.subjects)?;
        if let Some(condition) = &self.condition {
            write!(f, " {}", condition.describe())?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rule set
// ═══════════════════════════════════════════════════════════════════════════════

/// Ordered list of rules with a small registration vocabulary.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Grant `actions` on `subjects` unconditionally.
    pub fn can<I>(&mut self, actions: I, subjects: impl Into<Subjects>) -> &mut Self
    where
        I: IntoIterator<Item = Action>,
    {
        self.push(Rule::new(actions, subjects))
    }

    /// Grant `actions` on `subjects` whose attributes match.
    pub fn can_where<I>(
        &mut self,
        actions: I,
        subjects: impl Into<Subjects>,
        matcher: AttributeMatch,
    ) -> &mut Self
    where
        I: IntoIterator<Item = Action>,
    {
        self.push(Rule::new(actions, subjects).where_attributes(matcher))
    }

    /// Grant `actions` on `subjects` for which `predicate` holds.
    pub fn can_if<I, F>(
        &mut self,
        actions: I,
        subjects: impl Into<Subjects>,
        name: impl Into<String>,
        predicate: F,
    ) -> &mut Self
    where
        I: IntoIterator<Item = Action>,
        F: Fn(&dyn Resource, &QueryContext) -> bool + Send + Sync + 'static,
    {
        self.push(Rule::new(actions, subjects).when(name, predicate))
    }

    /// Append every rule of `other`, preserving order.
    pub fn extend(&mut self, other: impl IntoIterator<Item = Rule>) {
        self.rules.extend(other);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

impl IntoIterator for RuleSet {
    type Item = Rule;
    type IntoIter = std::vec::IntoIter<Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.into_iter()
    }
}

/// Compare a resource attribute with a user id; `false` when either is absent.
/// Integer and string ids compare by their decimal form.
pub fn attribute_is(resource: &dyn Resource, path: &str, expected: &Value) -> bool {
    resource
        .attribute_path(path)
        .is_some_and(|actual| scalar_eq(expected, &actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::models::Record;
    use serde_json::json;

    const ORDER: ResourceType = ResourceType::from_static("order");
    const ZONE: ResourceType = ResourceType::from_static("zone");

    fn requested(actions: &[Action]) -> BTreeSet<Action> {
        actions.iter().cloned().collect()
    }

    #[test]
    fn test_manage_all_is_relevant_everywhere() {
        let rule = Rule::manage_all();
        assert!(rule.is_relevant(&requested(&[Action::DESTROY]), &ORDER));
        assert!(rule.is_relevant(&requested(&[Action::new("anything")]), &ZONE));
    }

    #[test]
    fn test_relevance_requires_action_and_subject() {
        let rule = Rule::new([Action::DISPLAY], ZONE);
        assert!(rule.is_relevant(&requested(&[Action::DISPLAY]), &ZONE));
        assert!(!rule.is_relevant(&requested(&[Action::UPDATE]), &ZONE));
        assert!(!rule.is_relevant(&requested(&[Action::DISPLAY]), &ORDER));
    }

    #[test]
    fn test_type_target_ignores_condition() {
        let rule = Rule::new([Action::READ], ORDER).when("never", |_, _| false);
        let ctx = QueryContext::new();
        assert!(rule.allows(&requested(&[Action::READ]), &Target::Type(&ORDER), &ctx));

        let order = Record::new(ORDER);
        assert!(!rule.allows(&requested(&[Action::READ]), &Target::from(&order), &ctx));
    }

    #[test]
    fn test_instance_target_evaluates_attributes() {
        let rule = Rule::new([Action::UPDATE], ORDER)
            .where_attributes(AttributeMatch::new().field("user_id", "u1"));
        let ctx = QueryContext::new();
        let mine = Record::new(ORDER).with("user_id", "u1");
        let theirs = Record::new(ORDER).with("user_id", "u2");

        assert!(rule.allows(&requested(&[Action::UPDATE]), &Target::from(&mine), &ctx));
        assert!(!rule.allows(&requested(&[Action::UPDATE]), &Target::from(&theirs), &ctx));
    }

    #[test]
    fn test_rule_set_preserves_order() {
        let mut rules = RuleSet::new();
        rules
            .can([Action::CREATE], ORDER)
            .can_where([Action::DISPLAY], ZONE, AttributeMatch::new().field("active", true))
            .can_if([Action::READ], ORDER, "owner", |_, _| true);

        assert_eq!(rules.len(), 3);
        assert_eq!(rules.rules()[0].to_string(), "can create on order");
        assert_eq!(rules.rules()[1].to_string(), "can display on zone where active=true");
        assert_eq!(rules.rules()[2].to_string(), "can read on order if owner");
    }

    #[test]
    fn test_attribute_is() {
        let item = Record::new(ORDER).with("user_id", "u1");
        assert!(attribute_is(&item, "user_id", &json!("u1")));
        assert!(!attribute_is(&item, "user_id", &json!("u2")));
        assert!(!attribute_is(&item, "user_id", &Value::Null));
        assert!(!attribute_is(&item, "missing", &json!("u1")));
    }

    #[test]
    fn test_attribute_is_with_integer_owner() {
        let order = Record::new(ORDER).with("user", json!({ "id": 7 }));
        assert!(attribute_is(&order, "user.id", &json!("7")));
        assert!(!attribute_is(&order, "user.id", &json!("8")));
    }

    #[test]
    fn test_subjects_display() {
        assert_eq!(Subjects::All.to_string(), "all");
        assert_eq!(Subjects::from([ZONE, ORDER]).to_string(), "order,zone");
    }
}
