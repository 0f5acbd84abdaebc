//! Well-known storefront resource types.
//!
//! The user-account type is configurable (`ability.user_type`) and therefore
//! not listed here.

use super::models::ResourceType;

// Catalog
pub const COUNTRY: ResourceType = ResourceType::from_static("country");
pub const IMAGE: ResourceType = ResourceType::from_static("image");
pub const OPTION_TYPE: ResourceType = ResourceType::from_static("option_type");
pub const OPTION_VALUE: ResourceType = ResourceType::from_static("option_value");
pub const PRODUCT: ResourceType = ResourceType::from_static("product");
pub const PRODUCT_PROPERTY: ResourceType = ResourceType::from_static("product_property");
pub const PROPERTY: ResourceType = ResourceType::from_static("property");
pub const PROTOTYPE: ResourceType = ResourceType::from_static("prototype");
pub const STATE: ResourceType = ResourceType::from_static("state");
pub const TAXON: ResourceType = ResourceType::from_static("taxon");
pub const TAXONOMY: ResourceType = ResourceType::from_static("taxonomy");
pub const VARIANT: ResourceType = ResourceType::from_static("variant");
pub const ZONE: ResourceType = ResourceType::from_static("zone");

// Checkout and fulfilment
pub const ADJUSTMENT: ResourceType = ResourceType::from_static("adjustment");
pub const CREDIT_CARD: ResourceType = ResourceType::from_static("credit_card");
pub const CUSTOMER_RETURN: ResourceType = ResourceType::from_static("customer_return");
pub const LINE_ITEM: ResourceType = ResourceType::from_static("line_item");
pub const ORDER: ResourceType = ResourceType::from_static("order");
pub const PAYMENT: ResourceType = ResourceType::from_static("payment");
pub const RETURN_AUTHORIZATION: ResourceType = ResourceType::from_static("return_authorization");
pub const SHIPMENT: ResourceType = ResourceType::from_static("shipment");

// Inventory
pub const STOCK_ITEM: ResourceType = ResourceType::from_static("stock_item");
pub const STOCK_LOCATION: ResourceType = ResourceType::from_static("stock_location");

// Accounts
pub const ROLE: ResourceType = ResourceType::from_static("role");
pub const STORE_CREDIT: ResourceType = ResourceType::from_static("store_credit");
