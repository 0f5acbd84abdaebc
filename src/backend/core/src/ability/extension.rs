//! Extension abilities: independently defined policies merged into the host's.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::User;
use super::policy::Ability;
use super::registry::PolicyRegistry;
use super::rule::{Rule, RuleSet};
use crate::error::{Result, TollgateError};
use crate::telemetry::metrics::AbilityMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A policy contributor built per user and concatenated onto the host policy.
pub trait ExtensionAbility: Send + Sync {
    /// Unique name. Registering a second extension with the same name is a no-op.
    fn name(&self) -> &str;

    /// The rules this extension grants `user`.
    fn build_rules(&self, user: &User) -> Result<Vec<Rule>>;
}

/// An extension defined by a closure over the user.
pub struct FnExtension<F> {
    name: String,
    build: F,
}

impl<F> FnExtension<F>
where
    F: Fn(&User, &mut RuleSet) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }
}

impl<F> ExtensionAbility for FnExtension<F>
where
    F: Fn(&User, &mut RuleSet) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn build_rules(&self, user: &User) -> Result<Vec<Rule>> {
        let mut rules = RuleSet::new();
        (self.build)(user, &mut rules)?;
        Ok(rules.into_rules())
    }
}

/// An extension that is itself a complete ability.
///
/// The inner registry runs the whole build (aliases, default grants,
/// permission sets and its own extensions) for the same user, and every
/// resulting rule is appended to the outer policy. Nothing else is shared.
///
/// A nested ability whose registry is already being built further up the
/// same build (itself, or `A -> B -> A`) fails instead of recursing, and is
/// skipped like any other failing extension.
pub struct NestedAbility {
    name: String,
    registry: PolicyRegistry,
}

impl NestedAbility {
    pub fn new(name: impl Into<String>, registry: PolicyRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }
}

impl ExtensionAbility for NestedAbility {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_rules(&self, user: &User) -> Result<Vec<Rule>> {
        if self.registry.is_building() {
            return Err(TollgateError::extension(
                self.name.as_str(),
                "nested ability refers back to a registry that is already being built",
            ));
        }

        let inner = Ability::build(Some(user), &self.registry);
        if let Some(err) = inner.skipped().first() {
            debug!(
                extension = %self.name,
                skipped = inner.skipped().len(),
                first_error = %err,
                "Nested ability built with skipped contributors"
            );
        }
        Ok(inner.into_rules())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Concurrent set of extension abilities, kept in registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: RwLock<Arc<Vec<Arc<dyn ExtensionAbility>>>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.names())
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension. Returns `false` if one with the same name is registered.
    pub fn register(&self, extension: Arc<dyn ExtensionAbility>) -> bool {
        let mut guard = self.extensions.write();
        if guard.iter().any(|e| e.name() == extension.name()) {
            debug!(extension = extension.name(), "Extension ability already registered");
            return false;
        }
        debug!(extension = extension.name(), "Registering extension ability");
        let mut next = guard.as_ref().clone();
        next.push(extension);
        *guard = Arc::new(next);
        true
    }

    /// Remove an extension by name.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.extensions.write();
        let before = guard.len();
        let next: Vec<_> = guard.iter().filter(|e| e.name() != name).cloned().collect();
        if next.len() == before {
            return false;
        }
        debug!(extension = name, "Removed extension ability");
        *guard = Arc::new(next);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.read().iter().any(|e| e.name() == name)
    }

    pub fn len(&self) -> usize {
        self.extensions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.extensions.read().iter().map(|e| e.name().to_string()).collect()
    }

    /// The current membership. Later registrations do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn ExtensionAbility>>> {
        self.extensions.read().clone()
    }

    /// Build every extension for `user` and append the rules of those that
    /// succeed. Returns the errors of those that did not.
    pub fn apply(&self, rules: &mut RuleSet, user: &User) -> Vec<TollgateError> {
        let mut failures = Vec::new();

        for extension in self.snapshot().iter() {
            match extension.build_rules(user) {
                Ok(extra) => {
                    debug!(
                        extension = extension.name(),
                        rules = extra.len(),
                        "Merged extension ability"
                    );
                    rules.extend(extra);
                }
                Err(err) => {
                    warn!(
                        extension = extension.name(),
                        user_id = ?user.id,
                        error = %err,
                        "Skipping extension ability that failed to build"
                    );
                    AbilityMetrics::record_contributor_failure("extension", extension.name());
                    failures.push(err);
                }
            }
        }

        failures
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::action::Action;
    use crate::ability::resources::{PRODUCT, SHIPMENT};

    fn shipping() -> Arc<dyn ExtensionAbility> {
        Arc::new(FnExtension::new("shipping", |_user: &User, rules: &mut RuleSet| {
            rules.can([Action::UPDATE], SHIPMENT);
            Ok(())
        }))
    }

    fn broken() -> Arc<dyn ExtensionAbility> {
        Arc::new(FnExtension::new("broken", |_user: &User, _rules: &mut RuleSet| {
            Err(TollgateError::extension("broken", "missing collaborator"))
        }))
    }

    #[test]
    fn test_register_is_set_like() {
        let registry = ExtensionRegistry::new();
        assert!(registry.register(shipping()));
        assert!(!registry.register(shipping()));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("shipping"));
    }

    #[test]
    fn test_remove() {
        let registry = ExtensionRegistry::new();
        registry.register(shipping());
        assert!(registry.remove("shipping"));
        assert!(!registry.remove("shipping"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let registry = ExtensionRegistry::new();
        registry.register(shipping());
        let snapshot = registry.snapshot();
        registry.register(broken());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_apply_skips_failures() {
        let registry = ExtensionRegistry::new();
        registry.register(broken());
        registry.register(shipping());

        let mut rules = RuleSet::new();
        let failures = registry.apply(&mut rules, &User::guest());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].code(), crate::error::ErrorCode::ExtensionFailed);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_nested_ability_contributes_full_build() {
        let inner = PolicyRegistry::default();
        inner.register_extension_ability(Arc::new(FnExtension::new(
            "product_editing",
            |_user: &User, rules: &mut RuleSet| {
                rules.can([Action::UPDATE], PRODUCT);
                Ok(())
            },
        )));

        let nested = NestedAbility::new("catalog", inner);
        let rules = nested.build_rules(&User::new("1")).unwrap();
        // generic grants plus the inner extension
        assert_eq!(rules.len(), 20);
        assert_eq!(rules[19].to_string(), "can update on product");
    }

    #[test]
    fn test_self_referencing_nested_ability_is_skipped() {
        let registry = PolicyRegistry::default();
        registry.register_extension_ability(Arc::new(NestedAbility::new("self", registry.clone())));

        let ability = Ability::build(Some(&User::new("1")), &registry);
        assert_eq!(ability.skipped().len(), 1);
        assert_eq!(ability.skipped()[0].code(), crate::error::ErrorCode::ExtensionFailed);
        assert_eq!(ability.rules().len(), 19);
        assert!(!registry.is_building());

        // break the Arc cycle so the registry is freed
        assert!(registry.remove_extension_ability("self"));
    }
}
