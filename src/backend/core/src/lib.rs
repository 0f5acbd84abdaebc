#![allow(clippy::result_large_err)]
//! # Tollgate Core
//!
//! Role-based authorization policies for a storefront.
//!
//! ## Architecture
//!
//! - **Ability**: Per-user policy built from default grants, role-activated
//!   permission sets and extension abilities, answering `can` / `cannot`
//! - **Policy registry**: Host-owned, thread-safe registry of permission sets,
//!   role assignments and extension abilities applied to every build
//! - **Telemetry**: Structured logging and metrics
//! - **Config**: Layered file and environment configuration

pub mod ability;
pub mod config;
pub mod error;
pub mod telemetry;

pub use error::{ErrorCode, ErrorSeverity, Result, TollgateError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ability::{
        resources, Ability, Action, AliasTable, AttributeMatch, BuiltinSet, Condition,
        ExtensionAbility, FnExtension, Grant, NestedAbility, PermissionSet, PolicyDecision,
        PolicyRegistry, QueryContext, Record, Resource, ResourceType, RoleName, Rule, RuleSet,
        Subjects, Target, User, UserId,
    };
    pub use crate::config::{AbilityConfig, Config};
    pub use crate::error::{ErrorCode, ErrorSeverity, Result, TollgateError};
}
