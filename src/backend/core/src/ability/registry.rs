//! The host-owned policy registry handed to every ability build.

use std::cell::RefCell;
use std::sync::Arc;
use tracing::info;

use super::extension::{ExtensionAbility, ExtensionRegistry};
use super::models::{ResourceType, RoleName};
use super::permission_set::{BuiltinSet, PermissionSet, RoleConfiguration};
use crate::config::AbilityConfig;
use crate::error::Result;

thread_local! {
    /// Registries with an ability build in progress on this thread, innermost last.
    static BUILDING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct RegistryInner {
    config: AbilityConfig,
    roles: RoleConfiguration,
    extensions: ExtensionRegistry,
}

/// Permission sets, role assignments and extension abilities applied to every
/// ability build.
///
/// Cloning is cheap and clones share state, so a registry can be stored in
/// application state and registered into from any thread.
#[derive(Clone)]
pub struct PolicyRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("config", &self.inner.config)
            .field("roles", &self.inner.roles)
            .field("extensions", &self.inner.extensions)
            .finish()
    }
}

impl PolicyRegistry {
    /// An empty registry: no permission sets, no extensions.
    pub fn new(config: AbilityConfig) -> Self {
        let roles = RoleConfiguration::new(config.default_role.as_str());
        Self {
            inner: Arc::new(RegistryInner {
                config,
                roles,
                extensions: ExtensionRegistry::new(),
            }),
        }
    }

    /// A registry with the built-in permission sets registered and the
    /// configured role assignments applied.
    pub fn from_config(config: &AbilityConfig) -> Result<Self> {
        let registry = Self::new(config.clone());
        for set in BuiltinSet::all_sets(&registry.user_type()) {
            registry.register_permission_set(set);
        }

        for (role, sets) in &config.roles {
            let names: Vec<&str> = sets.iter().map(String::as_str).collect();
            registry.assign_permissions(role.as_str(), &names)?;
        }

        info!(
            permission_sets = registry.inner.roles.set_names().len(),
            roles = config.roles.len(),
            "Policy registry configured"
        );
        Ok(registry)
    }

    pub fn config(&self) -> &AbilityConfig {
        &self.inner.config
    }

    /// Resource type of user accounts.
    pub fn user_type(&self) -> ResourceType {
        ResourceType::new(self.inner.config.user_type.clone())
    }

    pub fn role_configuration(&self) -> &RoleConfiguration {
        &self.inner.roles
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.inner.extensions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Build tracking
    // ─────────────────────────────────────────────────────────────────────────

    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Whether a build over this registry (or a clone of it) is running on
    /// the current thread.
    pub(crate) fn is_building(&self) -> bool {
        let key = self.key();
        BUILDING.with(|building| building.borrow().contains(&key))
    }

    /// Mark this registry as being built until the guard drops.
    pub(crate) fn enter_build(&self) -> BuildGuard {
        let key = self.key();
        BUILDING.with(|building| building.borrow_mut().push(key));
        BuildGuard { key }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permission sets
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a permission set. Returns `false` if the name is taken.
    pub fn register_permission_set(&self, set: Arc<dyn PermissionSet>) -> bool {
        self.inner.roles.register(set)
    }

    pub fn remove_permission_set(&self, name: &str) -> bool {
        self.inner.roles.remove(name)
    }

    /// Activate the named sets for holders of `role`.
    pub fn assign_permissions(&self, role: impl Into<RoleName>, sets: &[&str]) -> Result<()> {
        self.inner.roles.assign_permissions(role, sets)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Extension abilities
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an extension ability. Returns `false` if the name is taken.
    pub fn register_extension_ability(&self, extension: Arc<dyn ExtensionAbility>) -> bool {
        self.inner.extensions.register(extension)
    }

    pub fn remove_extension_ability(&self, name: &str) -> bool {
        self.inner.extensions.remove(name)
    }
}

/// Clears the build mark set by [`PolicyRegistry::enter_build`].
pub(crate) struct BuildGuard {
    key: usize,
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        BUILDING.with(|building| {
            let mut building = building.borrow_mut();
            if let Some(pos) = building.iter().rposition(|key| *key == self.key) {
                building.remove(pos);
            }
        });
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new(AbilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::BTreeMap;

    #[test]
    fn test_from_config_registers_builtins() {
        let registry = PolicyRegistry::from_config(&AbilityConfig::default()).unwrap();
        let names = registry.role_configuration().set_names();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&"order_management".to_string()));
    }

    #[test]
    fn test_from_config_applies_roles() {
        let mut roles = BTreeMap::new();
        roles.insert("clerk".to_string(), vec!["order_display".to_string()]);
        let config = AbilityConfig {
            roles,
            ..AbilityConfig::default()
        };

        let registry = PolicyRegistry::from_config(&config).unwrap();
        assert_eq!(registry.role_configuration().assigned("clerk"), vec!["order_display"]);
    }

    #[test]
    fn test_from_config_rejects_unknown_set() {
        let mut roles = BTreeMap::new();
        roles.insert("clerk".to_string(), vec!["refunds".to_string()]);
        let config = AbilityConfig {
            roles,
            ..AbilityConfig::default()
        };

        let err = PolicyRegistry::from_config(&config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownPermissionSet);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = PolicyRegistry::from_config(&AbilityConfig::default()).unwrap();
        let clone = registry.clone();
        assert!(clone.remove_permission_set("super_user"));
        assert!(!registry.role_configuration().contains("super_user"));
    }

    #[test]
    fn test_build_guard_marks_clones() {
        let registry = PolicyRegistry::default();
        let clone = registry.clone();
        assert!(!clone.is_building());
        {
            let _guard = registry.enter_build();
            assert!(clone.is_building());
            assert!(!PolicyRegistry::default().is_building());
        }
        assert!(!clone.is_building());
    }

    #[test]
    fn test_default_role_follows_config() {
        let config = AbilityConfig {
            default_role: "everyone".to_string(),
            ..AbilityConfig::default()
        };
        let registry = PolicyRegistry::new(config);
        assert_eq!(registry.role_configuration().default_role().as_str(), "everyone");
    }
}
