use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// TradeContract is the root entity of the trade graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeContract {
    #[serde(rename = "TradeContract.id", default)]
    pub id: String,
    #[serde(rename = "TradeContract.contractNo", default)]
    pub contract_no: String,
    #[serde(rename = "TradeContract.contractDate", default)]
    pub contract_date: String,
    #[serde(rename = "TradeContract.status", default)]
    pub status: String,
    #[serde(rename = "TradeContract.description", default)]
    pub description: String, // Generated on upsert, embedded for search

    #[serde(
        rename = "TradeContract.seller",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub seller: Option<Member>,
    #[serde(
        rename = "TradeContract.buyer",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub buyer: Option<Member>,
    #[serde(
        rename = "TradeContract.broker",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub broker: Option<Member>,
    #[serde(
        rename = "TradeContract.productGoods",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub product_goods: Option<ProductGoods>,

    #[serde(rename = "TradeContract.fixedPrice", default)]
    pub fixed_price: bool,
    #[serde(rename = "TradeContract.pricingMethod", default)]
    pub pricing_method: String,
}

/// Member is a trading party; shared by every contract that names it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "Member.id", default)]
    pub id: String,
    #[serde(rename = "Member.companyName", default)]
    pub company_name: String,
    #[serde(rename = "Member.contactDetails", default)]
    pub contact_details: String,
    #[serde(rename = "Member.memberPublicKey", default)]
    pub member_public_key: String,
}

/// ProductGoods is keyed by its name rather than an id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductGoods {
    #[serde(rename = "ProductGoods.name", default)]
    pub name: String,
    #[serde(rename = "ProductGoods.quantity", default)]
    pub quantity: i32,
    #[serde(rename = "ProductGoods.hsCode", default)]
    pub hs_code: String,
    #[serde(rename = "ProductGoods.originCountry", default)]
    pub origin_country: String,
    #[serde(
        rename = "ProductGoods.commodityReference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub commodity_reference: Option<CommodityReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommodityReference {
    #[serde(rename = "CommodityReference.id", default)]
    pub id: String,
    #[serde(rename = "CommodityReference.symbol", default)]
    pub symbol: String,
    #[serde(rename = "CommodityReference.name", default)]
    pub name: String,
    #[serde(rename = "CommodityReference.category", default)]
    pub category: String,
}

/// SearchRequest represents a text search over contract descriptions
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// UpsertResponse maps blank-node labels to the uids the store assigned
#[derive(Debug, Clone, Serialize)]
pub struct UpsertResponse {
    pub id: String,
    pub uids: HashMap<String, String>,
}

/// ErrorResponse represents an error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
