//! Default permission grants.
//!
//! | User                        | Grant                                        |
//! |-----------------------------|----------------------------------------------|
//! | holds the privileged role   | `manage` on `all`                            |
//! | anyone else, guests included| browse the catalog, check out, own records   |

use serde_json::{json, Value};
use tracing::debug;

use super::action::Action;
use super::condition::{AttributeMatch, QueryContext};
use super::models::{Resource, ResourceType, User};
use super::resources::*;
use super::rule::{attribute_is, Rule, RuleSet};
use crate::config::AbilityConfig;

/// Grant the default rules for `user`. Returns `true` when the user is privileged.
pub fn grant_default_permissions(user: &User, config: &AbilityConfig, rules: &mut RuleSet) -> bool {
    if user.has_role(&config.privileged_role) {
        debug!(user_id = ?user.id, role = %config.privileged_role, "Granting manage on all");
        rules.push(Rule::manage_all());
        true
    } else {
        grant_generic_user_permissions(user, &ResourceType::new(config.user_type.clone()), rules);
        false
    }
}

/// Rules every shopper gets: browse the catalog, check out, and manage
/// their own orders, payment sources and account.
pub fn grant_generic_user_permissions(user: &User, user_type: &ResourceType, rules: &mut RuleSet) {
    let user_id = user.id_value();

    rules.can([Action::DISPLAY], COUNTRY);
    rules.can([Action::DISPLAY], OPTION_TYPE);
    rules.can([Action::DISPLAY], OPTION_VALUE);
    rules.can([Action::CREATE], ORDER);

    let owner = user_id.clone();
    rules.can_if(
        [Action::READ, Action::UPDATE],
        ORDER,
        "order owner or guest token",
        move |order, ctx| owns(order, "", &owner) || guest_token_matches(order, ctx),
    );

    let owner = user_id.clone();
    rules.can_if(
        [Action::CREATE],
        RETURN_AUTHORIZATION,
        "owns the returned order",
        move |return_authorization, _| owns(return_authorization, "order.", &owner),
    );

    rules.can_where(
        [Action::DISPLAY, Action::UPDATE],
        CREDIT_CARD,
        AttributeMatch::new().field("user_id", user_id.clone()),
    );
    rules.can([Action::DISPLAY], PRODUCT);
    rules.can([Action::DISPLAY], PRODUCT_PROPERTY);
    rules.can([Action::DISPLAY], PROPERTY);
    rules.can([Action::CREATE], user_type.clone());
    rules.can_where(
        [Action::READ, Action::UPDATE],
        user_type.clone(),
        AttributeMatch::new().field("id", user_id),
    );
    rules.can([Action::DISPLAY], STATE);
    rules.can_where(
        [Action::DISPLAY],
        STOCK_ITEM,
        AttributeMatch::new().field("stock_location", json!({ "active": true })),
    );
    rules.can_where(
        [Action::DISPLAY],
        STOCK_LOCATION,
        AttributeMatch::new().field("active", true),
    );
    rules.can([Action::DISPLAY], TAXON);
    rules.can([Action::DISPLAY], TAXONOMY);
    rules.can([Action::DISPLAY, Action::VIEW_OUT_OF_STOCK], VARIANT);
    rules.can([Action::DISPLAY], ZONE);

    debug!(user_id = ?user.id, rules = rules.len(), "Granted generic user permissions");
}

/// The resource (or the association under `prefix`) belongs to `user_id`,
/// either through a `user_id` column or an embedded `user` object.
fn owns(resource: &dyn Resource, prefix: &str, user_id: &Value) -> bool {
    attribute_is(resource, &format!("{}user_id", prefix), user_id)
        || attribute_is(resource, &format!("{}user.id", prefix), user_id)
}

/// The resource carries a guest token and the caller presented the same one.
fn guest_token_matches(resource: &dyn Resource, ctx: &QueryContext) -> bool {
    match (resource.attribute("guest_token"), ctx.token.as_deref()) {
        (Some(Value::String(expected)), Some(given)) => !expected.is_empty() && expected == given,
        _ => false,
    }
}
