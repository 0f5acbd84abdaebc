//! Storefront authorization abilities.
//!
//! This module provides:
//! - **Models**: User, role and resource abstractions the policy reads
//! - **Actions**: Canonical actions and the alias table that maps surface verbs onto them
//! - **Rules**: Allow rules with optional attribute-match or predicate conditions
//! - **Default grants**: Full access for the privileged role, storefront rules for everyone else
//! - **Permission sets**: Role-activated rule bundles, including the built-in display and
//!   management sets
//! - **Extensions**: Independently defined abilities merged into the host policy
//! - **Ability**: The per-user policy and its `can` / `cannot` / `authorize` queries
//!
//! # Usage
//!
//! ```rust
//! use tollgate_core::ability::{resources::PRODUCT, Ability, Action, PolicyRegistry, User};
//! use tollgate_core::config::AbilityConfig;
//!
//! let registry = PolicyRegistry::from_config(&AbilityConfig::default()).unwrap();
//! registry.assign_permissions("catalog_manager", &["product_management"]).unwrap();
//!
//! let user = User::new("42").with_role("catalog_manager");
//! let ability = Ability::build(Some(&user), &registry);
//!
//! assert!(ability.can(Action::SHOW, &PRODUCT));
//! assert!(ability.can(Action::DESTROY, &PRODUCT));
//! assert!(Ability::build(None, &registry).cannot(Action::DESTROY, &PRODUCT));
//! ```

pub mod action;
pub mod condition;
pub mod defaults;
pub mod extension;
pub mod models;
pub mod permission_set;
pub mod policy;
pub mod registry;
pub mod resources;
pub mod rule;

pub use action::{Action, AliasTable};
pub use condition::{AttributeMatch, Condition, Predicate, QueryContext};
pub use defaults::{grant_default_permissions, grant_generic_user_permissions};
pub use extension::{ExtensionAbility, ExtensionRegistry, FnExtension, NestedAbility};
pub use models::{Record, Resource, ResourceType, RoleName, User, UserId};
pub use permission_set::{
    Activation, BuiltinPermissionSet, BuiltinSet, PermissionSet, RoleConfiguration,
};
pub use policy::{Ability, Grant, PolicyDecision};
pub use registry::PolicyRegistry;
pub use rule::{Rule, RuleSet, Subjects, Target};
