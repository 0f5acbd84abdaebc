//! Actions and the action alias table.
//!
//! Rules are written against canonical actions (`display`, `update`, ...).
//! Requests may use surface verbs (`show`, `edit`, `delete`); the alias table
//! maps each surface verb onto the canonical actions it stands for.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An action identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const CREATE: Action = Action::from_static("create");
    pub const READ: Action = Action::from_static("read");
    pub const UPDATE: Action = Action::from_static("update");
    pub const DESTROY: Action = Action::from_static("destroy");
    pub const DISPLAY: Action = Action::from_static("display");
    pub const VIEW_OUT_OF_STOCK: Action = Action::from_static("view_out_of_stock");
    /// Access to the back-office screens of a resource.
    pub const ADMIN: Action = Action::from_static("admin");
    /// Matches every action.
    pub const MANAGE: Action = Action::from_static("manage");

    pub const DELETE: Action = Action::from_static("delete");
    pub const EDIT: Action = Action::from_static("edit");
    pub const NEW: Action = Action::from_static("new");
    pub const NEW_ACTION: Action = Action::from_static("new_action");
    pub const SHOW: Action = Action::from_static("show");
    pub const INDEX: Action = Action::from_static("index");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_manage(&self) -> bool {
        self.as_str() == "manage"
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

impl From<&Action> for Action {
    fn from(a: &Action) -> Self {
        a.clone()
    }
}

/// Alias → canonical action mapping.
///
/// The table is owned by each [`Ability`](super::Ability) and rebuilt on every
/// build, so repeated builds in one process never accumulate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<Action, BTreeSet<Action>>,
}

impl AliasTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in storefront aliases.
    pub fn storefront() -> Self {
        let mut table = Self::new();
        table.register_storefront();
        table
    }

    /// Clear and re-register the built-in storefront aliases.
    pub fn register_storefront(&mut self) {
        self.clear();

        // `read` and `index` both collapse onto `display`.
        self.alias(&[Action::DELETE], Action::DESTROY);
        self.alias(&[Action::EDIT], Action::UPDATE);
        self.alias(&[Action::NEW], Action::CREATE);
        self.alias(&[Action::NEW_ACTION], Action::CREATE);
        self.alias(&[Action::SHOW], Action::READ);
        self.alias(&[Action::INDEX, Action::READ], Action::DISPLAY);
    }

    /// Remove every alias.
    pub fn clear(&mut self) {
        self.aliases.clear();
    }

    /// Register `aliases` as surface names for the canonical action `to`.
    pub fn alias(&mut self, aliases: &[Action], to: Action) {
        for alias in aliases {
            self.aliases
                .entry(alias.clone())
                .or_default()
                .insert(to.clone());
        }
    }

    /// Canonical actions directly registered for `alias`.
    pub fn targets(&self, alias: &Action) -> Option<&BTreeSet<Action>> {
        self.aliases.get(alias)
    }

    /// Every action a request for `action` may be satisfied by: the action
    /// itself plus the transitive closure of its alias targets.
    pub fn expand(&self, action: &Action) -> BTreeSet<Action> {
        let mut expanded = BTreeSet::new();
        let mut pending = vec![action.clone()];

        while let Some(next) = pending.pop() {
            if !expanded.insert(next.clone()) {
                continue;
            }
            if let Some(targets) = self.aliases.get(&next) {
                pending.extend(targets.iter().cloned());
            }
        }

        expanded
    }

    /// Number of registered (alias, target) pairs.
    pub fn len(&self) -> usize {
        self.aliases.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
