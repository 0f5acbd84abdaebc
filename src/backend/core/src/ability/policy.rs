//! The per-user ability: build once, then answer "can this user do X to Y?".

use std::fmt;
use tracing::{debug, trace};

use super::action::{Action, AliasTable};
use super::condition::QueryContext;
use super::defaults::grant_default_permissions;
use super::models::User;
use super::registry::PolicyRegistry;
use super::rule::{Rule, RuleSet, Subjects, Target};
use crate::error::{Result, TollgateError};
use crate::telemetry::logging::redact_token;
use crate::telemetry::metrics::{AbilityMetrics, BuildTimer};

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action is allowed.
    Allow,
    /// The action is denied, with a reason.
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

/// One (action, subjects) pair granted by a rule, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub action: Action,
    pub subjects: Subjects,
    /// The rule only applies to instances meeting a condition.
    pub conditional: bool,
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.subjects)?;
        if self.conditional {
            f.write_str(" (conditional)")?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ability
// ═══════════════════════════════════════════════════════════════════════════════

/// The policy of one user: an alias table plus an ordered list of allow rules.
///
/// Built fresh per authorization context and immutable afterwards. Anything
/// not granted by some rule is denied.
#[derive(Debug)]
pub struct Ability {
    user: User,
    aliases: AliasTable,
    rules: Vec<Rule>,
    privileged: bool,
    skipped: Vec<TollgateError>,
}

impl Ability {
    /// Build the policy for `user`, or for a guest when `None`.
    ///
    /// Steps, in order: storefront aliases, default grants, permission sets
    /// assigned to the user's roles, extension abilities. A permission set or
    /// extension that fails is skipped; the build itself never fails.
    pub fn build(user: Option<&User>, registry: &PolicyRegistry) -> Self {
        let timer = BuildTimer::start();
        let _building = registry.enter_build();
        let user = user.cloned().unwrap_or_else(User::guest);

        let aliases = AliasTable::storefront();
        let mut rules = RuleSet::new();

        let privileged = grant_default_permissions(&user, registry.config(), &mut rules);
        let activation = registry.role_configuration().activate_permissions(&mut rules, &user);
        let mut skipped = activation.failures;
        skipped.extend(registry.extensions().apply(&mut rules, &user));

        AbilityMetrics::record_build(rules.len(), skipped.len());
        let elapsed = timer.finish();

        debug!(
            user_id = ?user.id,
            privileged,
            rules = rules.len(),
            permission_sets = ?activation.activated,
            skipped = skipped.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "Ability built"
        );

        Self {
            user,
            aliases,
            rules: rules.into_rules(),
            privileged,
            skipped,
        }
    }

    /// Build with an empty registry: default grants only.
    pub fn for_user(user: Option<&User>) -> Self {
        Self::build(user, &PolicyRegistry::default())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `action` is allowed on `target` (a resource type or instance).
    pub fn can<'a>(&self, action: impl Into<Action>, target: impl Into<Target<'a>>) -> bool {
        self.can_with(action, target, &QueryContext::default())
    }

    /// [`Ability::can`] with caller-supplied context such as a guest token.
    pub fn can_with<'a>(
        &self,
        action: impl Into<Action>,
        target: impl Into<Target<'a>>,
        ctx: &QueryContext,
    ) -> bool {
        let action = action.into();
        let target = target.into();
        let allowed = self.matching_rule(&action, &target, ctx).is_some();
        AbilityMetrics::record_check(allowed);
        allowed
    }

    pub fn cannot<'a>(&self, action: impl Into<Action>, target: impl Into<Target<'a>>) -> bool {
        !self.can(action, target)
    }

    pub fn cannot_with<'a>(
        &self,
        action: impl Into<Action>,
        target: impl Into<Target<'a>>,
        ctx: &QueryContext,
    ) -> bool {
        !self.can_with(action, target, ctx)
    }

    /// Check and explain.
    pub fn decide<'a>(
        &self,
        action: impl Into<Action>,
        target: impl Into<Target<'a>>,
        ctx: &QueryContext,
    ) -> PolicyDecision {
        let action = action.into();
        let target = target.into();

        if self.can_with(&action, target, ctx) {
            return PolicyDecision::Allow;
        }
        PolicyDecision::Deny(format!(
            "{} may not {} {}",
            self.describe_user(),
            action,
            target.resource_type()
        ))
    }

    /// Convenience: `Ok(())` if allowed, an access-denied error otherwise.
    pub fn authorize<'a>(
        &self,
        action: impl Into<Action>,
        target: impl Into<Target<'a>>,
        ctx: &QueryContext,
    ) -> Result<()> {
        let action = action.into();
        let target = target.into();

        match self.decide(&action, target, ctx) {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Deny(reason) => {
                let err = TollgateError::access_denied(&action, target.resource_type())
                    .with_context("user", self.describe_user())
                    .with_context("reason", reason);
                err.log();
                Err(err)
            }
        }
    }

    /// First rule granting `action` on `target`, if any.
    fn matching_rule(
        &self,
        action: &Action,
        target: &Target<'_>,
        ctx: &QueryContext,
    ) -> Option<&Rule> {
        let requested = self.aliases.expand(action);
        let found = self.rules.iter().find(|rule| rule.allows(&requested, target, ctx));

        trace!(
            user_id = ?self.user.id,
            action = %action,
            target = ?target,
            token = ?ctx.token.as_deref().map(redact_token),
            rule = ?found.map(ToString::to_string),
            "Evaluated authorization query"
        );
        found
    }

    fn describe_user(&self) -> String {
        match &self.user.id {
            Some(id) => format!("user {}", id),
            None => "guest".to_string(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composition
    // ─────────────────────────────────────────────────────────────────────────

    /// Append every rule of `other`. Only rules are merged; the user and the
    /// alias table of `self` are kept.
    pub fn merge(&mut self, other: Ability) {
        self.rules.extend(other.rules);
        self.skipped.extend(other.skipped);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Rules in the order they were granted.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    /// Whether the user holds the privileged role.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Errors of the permission sets and extensions left out of this build.
    pub fn skipped(&self) -> &[TollgateError] {
        &self.skipped
    }

    /// Every (action, subjects) pair, flattened in rule order.
    pub fn permissions(&self) -> Vec<Grant> {
        self.rules
            .iter()
            .flat_map(|rule| {
                rule.actions().iter().map(move |action| Grant {
                    action: action.clone(),
                    subjects: rule.subjects().clone(),
                    conditional: rule.condition().is_some(),
                })
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
