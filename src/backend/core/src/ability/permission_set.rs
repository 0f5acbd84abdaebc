//! Permission sets: reusable, role-activated bundles of rules.
//!
//! A [`PermissionSet`] is registered once with a [`RoleConfiguration`] and
//! assigned to one or more roles. Every ability build asks the configuration
//! to activate the sets assigned to the user's roles (plus the implicit
//! default role). Sets activate in registration order, each into a scratch
//! rule set; a set that fails contributes nothing and the build carries on.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use super::action::Action;
use super::models::{ResourceType, RoleName, User};
use super::resources::*;
use super::rule::{Rule, RuleSet, Subjects};
use crate::error::{Result, TollgateError};
use crate::telemetry::metrics::AbilityMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// A named, activatable bundle of rules.
pub trait PermissionSet: Send + Sync {
    /// Unique name used in role assignments.
    fn name(&self) -> &str;

    /// Activation predicate evaluated after the role check. Defaults to yes.
    fn applies_to(&self, _user: &User) -> Result<bool> {
        Ok(true)
    }

    /// Add this set's rules for `user`.
    fn activate(&self, rules: &mut RuleSet, user: &User) -> Result<()>;
}

/// Outcome of activating the sets for one user.
#[derive(Debug, Default)]
pub struct Activation {
    /// Names of the sets whose rules were added, in order.
    pub activated: Vec<String>,
    /// Sets skipped because they failed.
    pub failures: Vec<TollgateError>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Concurrent registry of permission sets and their role assignments.
///
/// Readers take a snapshot of the set list, so registration never blocks on
/// in-flight builds and builds never observe a half-applied change.
pub struct RoleConfiguration {
    sets: RwLock<Arc<Vec<Arc<dyn PermissionSet>>>>,
    assignments: DashMap<RoleName, Vec<String>>,
    default_role: RoleName,
}

impl std::fmt::Debug for RoleConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleConfiguration")
            .field("sets", &self.set_names())
            .field("roles", &self.assignments.len())
            .field("default_role", &self.default_role)
            .finish()
    }
}

impl RoleConfiguration {
    /// Create an empty configuration whose implicit role is `default_role`.
    pub fn new(default_role: impl Into<RoleName>) -> Self {
        Self {
            sets: RwLock::new(Arc::new(Vec::new())),
            assignments: DashMap::new(),
            default_role: default_role.into(),
        }
    }

    pub fn default_role(&self) -> &RoleName {
        &self.default_role
    }

    /// Register a set. Returns `false` if a set with the same name exists.
    pub fn register(&self, set: Arc<dyn PermissionSet>) -> bool {
        let mut guard = self.sets.write();
        if guard.iter().any(|s| s.name() == set.name()) {
            debug!(permission_set = set.name(), "Permission set already registered");
            return false;
        }
        debug!(permission_set = set.name(), "Registering permission set");
        let mut next = guard.as_ref().clone();
        next.push(set);
        *guard = Arc::new(next);
        true
    }

    /// Remove a set by name. Role assignments naming it are left in place and
    /// ignored until a set with that name is registered again.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.sets.write();
        if !guard.iter().any(|s| s.name() == name) {
            return false;
        }
        let next: Vec<_> = guard.iter().filter(|s| s.name() != name).cloned().collect();
        *guard = Arc::new(next);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.read().iter().any(|s| s.name() == name)
    }

    pub fn set_names(&self) -> Vec<String> {
        self.sets.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// Assign sets to a role. Every name must already be registered.
    pub fn assign_permissions(&self, role: impl Into<RoleName>, set_names: &[&str]) -> Result<()> {
        let role = role.into();
        for name in set_names {
            if !self.contains(name) {
                return Err(TollgateError::unknown_permission_set(*name)
                    .with_context("role", role.as_str()));
            }
        }

        let mut entry = self.assignments.entry(role.clone()).or_default();
        for name in set_names {
            if !entry.iter().any(|existing| existing == name) {
                entry.push((*name).to_string());
            }
        }
        debug!(role = %role, sets = ?entry.value(), "Assigned permission sets");
        Ok(())
    }

    /// Drop every assignment of `role`.
    pub fn unassign(&self, role: &str) -> bool {
        self.assignments.remove(&RoleName::new(role)).is_some()
    }

    /// Set names assigned to a role.
    pub fn assigned(&self, role: &str) -> Vec<String> {
        self.assignments
            .get(&RoleName::new(role))
            .map(|names| names.clone())
            .unwrap_or_default()
    }

    /// Sets assigned to any of the user's roles or to the default role, in
    /// registration order, each at most once.
    pub fn sets_for(&self, user: &User) -> Vec<Arc<dyn PermissionSet>> {
        let mut wanted: Vec<String> = self.assigned(self.default_role.as_str());
        for role in &user.roles {
            wanted.extend(self.assigned(role.as_str()));
        }

        let snapshot = self.sets.read().clone();
        snapshot
            .iter()
            .filter(|set| wanted.iter().any(|name| name == set.name()))
            .cloned()
            .collect()
    }

    /// Append the rules of every applicable set to `rules`.
    pub fn activate_permissions(&self, rules: &mut RuleSet, user: &User) -> Activation {
        let mut outcome = Activation::default();

        for set in self.sets_for(user) {
            let mut scratch = RuleSet::new();
            let result = set.applies_to(user).and_then(|applies| {
                if applies {
                    set.activate(&mut scratch, user).map(|_| true)
                } else {
                    Ok(false)
                }
            });

            match result {
                Ok(true) => {
                    debug!(
                        permission_set = set.name(),
                        rules = scratch.len(),
                        "Activated permission set"
                    );
                    rules.extend(scratch);
                    outcome.activated.push(set.name().to_string());
                }
                Ok(false) => {
                    debug!(permission_set = set.name(), "Permission set does not apply");
                }
                Err(err) => {
                    warn!(
                        permission_set = set.name(),
                        user_id = ?user.id,
                        error = %err,
                        "Skipping permission set that failed to activate"
                    );
                    AbilityMetrics::record_contributor_failure("permission_set", set.name());
                    outcome.failures.push(err);
                }
            }
        }

        outcome
    }
}

impl Default for RoleConfiguration {
    fn default() -> Self {
        Self::new("default")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Built-in sets
// ═══════════════════════════════════════════════════════════════════════════════

const ORDER_TYPES: [ResourceType; 7] = [
    ORDER,
    PAYMENT,
    SHIPMENT,
    ADJUSTMENT,
    LINE_ITEM,
    RETURN_AUTHORIZATION,
    CUSTOMER_RETURN,
];

const PRODUCT_TYPES: [ResourceType; 10] = [
    PRODUCT,
    IMAGE,
    VARIANT,
    OPTION_VALUE,
    PRODUCT_PROPERTY,
    OPTION_TYPE,
    PROPERTY,
    PROTOTYPE,
    TAXONOMY,
    TAXON,
];

/// Built-in permission sets, the bundles a store typically hands to staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinSet {
    SuperUser,
    OrderDisplay,
    OrderManagement,
    ProductDisplay,
    ProductManagement,
    StockDisplay,
    StockManagement,
    UserDisplay,
    UserManagement,
}

impl BuiltinSet {
    pub fn all() -> Vec<BuiltinSet> {
        vec![
            Self::SuperUser,
            Self::OrderDisplay,
            Self::OrderManagement,
            Self::ProductDisplay,
            Self::ProductManagement,
            Self::StockDisplay,
            Self::StockManagement,
            Self::UserDisplay,
            Self::UserManagement,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::SuperUser => "super_user",
            Self::OrderDisplay => "order_display",
            Self::OrderManagement => "order_management",
            Self::ProductDisplay => "product_display",
            Self::ProductManagement => "product_management",
            Self::StockDisplay => "stock_display",
            Self::StockManagement => "stock_management",
            Self::UserDisplay => "user_display",
            Self::UserManagement => "user_management",
        }
    }

    /// Bind to a user-account resource type, producing a registrable set.
    pub fn with_user_type(self, user_type: ResourceType) -> BuiltinPermissionSet {
        BuiltinPermissionSet {
            kind: self,
            user_type,
        }
    }

    /// Every built-in set bound to `user_type`.
    pub fn all_sets(user_type: &ResourceType) -> Vec<Arc<dyn PermissionSet>> {
        Self::all()
            .into_iter()
            .map(|kind| Arc::new(kind.with_user_type(user_type.clone())) as Arc<dyn PermissionSet>)
            .collect()
    }
}

/// A [`BuiltinSet`] bound to the configured user-account type.
#[derive(Debug, Clone)]
pub struct BuiltinPermissionSet {
    kind: BuiltinSet,
    user_type: ResourceType,
}

impl PermissionSet for BuiltinPermissionSet {
    fn name(&self) -> &str {
        self.kind.id()
    }

    fn activate(&self, rules: &mut RuleSet, _user: &User) -> Result<()> {
        let display = [Action::DISPLAY, Action::ADMIN];
        let manage = [Action::MANAGE];

        match self.kind {
            BuiltinSet::SuperUser => {
                rules.push(Rule::manage_all());
            }
            BuiltinSet::OrderDisplay => {
                rules.can(display, ORDER_TYPES);
            }
            BuiltinSet::OrderManagement => {
                rules.can(manage, ORDER_TYPES);
            }
            BuiltinSet::ProductDisplay => {
                rules.can(display, PRODUCT_TYPES);
            }
            BuiltinSet::ProductManagement => {
                rules.can(manage, PRODUCT_TYPES);
            }
            BuiltinSet::StockDisplay => {
                rules.can(display, [STOCK_ITEM, STOCK_LOCATION]);
            }
            BuiltinSet::StockManagement => {
                rules.can(manage, STOCK_ITEM);
                rules.can(display, STOCK_LOCATION);
            }
            BuiltinSet::UserDisplay => {
                rules.can(display, Subjects::from([self.user_type.clone(), STORE_CREDIT]));
                rules.can([Action::DISPLAY], ROLE);
            }
            BuiltinSet::UserManagement => {
                rules.can(
                    [Action::ADMIN, Action::DISPLAY, Action::CREATE, Action::UPDATE],
                    self.user_type.clone(),
                );
                rules.can(manage, STORE_CREDIT);
                rules.can([Action::DISPLAY], ROLE);
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
