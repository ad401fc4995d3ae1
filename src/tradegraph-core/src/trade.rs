//! Trade contract domain: schema, description text, and the contract service
//! built on [`EntityStore`].

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::connection::{Filter, Selection};
use crate::embedder::Embedder;
use crate::error::{GraphError, Result};
use crate::models::TradeContract;
use crate::mutation::MutationBuilder;
use crate::schema::{Relationship, SchemaRegistry};
use crate::store::{EmbeddingField, EntityStore};
use crate::tree::EntityTree;

pub const CONTRACT_TYPE: &str = "TradeContract";
pub const CONTRACT_ID: &str = "TradeContract.id";
pub const CONTRACT_EMBEDDING: &str = "TradeContract.embedding";

const MEMBER_FIELDS: [&str; 4] = [
    "Member.id",
    "Member.companyName",
    "Member.contactDetails",
    "Member.memberPublicKey",
];

const CONTRACT_SCALARS: [&str; 7] = [
    "TradeContract.id",
    "TradeContract.contractNo",
    "TradeContract.contractDate",
    "TradeContract.status",
    "TradeContract.description",
    "TradeContract.fixedPrice",
    "TradeContract.pricingMethod",
];

/// Every predicate a contract owns; deleting these detaches it from shared nodes
const CONTRACT_PREDICATES: [&str; 12] = [
    "TradeContract.id",
    "TradeContract.contractNo",
    "TradeContract.contractDate",
    "TradeContract.status",
    "TradeContract.description",
    "TradeContract.fixedPrice",
    "TradeContract.pricingMethod",
    "TradeContract.seller",
    "TradeContract.buyer",
    "TradeContract.broker",
    "TradeContract.productGoods",
    CONTRACT_EMBEDDING,
];

/// Node types and relationships of the trade graph
pub fn trade_schema() -> SchemaRegistry {
    let mut schema = SchemaRegistry::new();
    schema
        .register(
            CONTRACT_TYPE,
            CONTRACT_ID,
            vec![
                Relationship::new("TradeContract.seller", "Member"),
                Relationship::new("TradeContract.buyer", "Member"),
                Relationship::new("TradeContract.broker", "Member"),
                Relationship::new("TradeContract.productGoods", "ProductGoods"),
            ],
        )
        .register("Member", "Member.id", vec![])
        .register(
            "ProductGoods",
            "ProductGoods.name",
            vec![Relationship::new(
                "ProductGoods.commodityReference",
                "CommodityReference",
            )],
        )
        .register("CommodityReference", "CommodityReference.id", vec![]);
    schema
}

/// Searchable one-line summary of a contract
pub fn describe_contract(contract: &TradeContract) -> String {
    let mut description = format!(
        "Contract {} dated {}",
        contract.contract_no, contract.contract_date
    );

    if let Some(seller) = &contract.seller {
        description.push_str(&format!(" Seller: {}", seller.company_name));
    }
    if let Some(buyer) = &contract.buyer {
        description.push_str(&format!(" Buyer: {}", buyer.company_name));
    }

    if let Some(goods) = &contract.product_goods {
        description.push_str(&format!(" Product: {}", goods.name));
        if let Some(commodity) = &goods.commodity_reference {
            description.push_str(&format!(" Commodity: {}", commodity.name));
        }
        description.push_str(&format!(
            " Quantity: {} Origin: {}",
            goods.quantity, goods.origin_country
        ));
    }

    let pricing = if contract.fixed_price { "Fixed" } else { "Variable" };
    description.push_str(&format!(
        " Pricing: {} - {}",
        pricing, contract.pricing_method
    ));
    description
}

/// Full contract shape, every nested node included
pub fn contract_selection() -> Selection {
    Selection::new()
        .fields(CONTRACT_SCALARS)
        .edge("TradeContract.seller", Selection::new().fields(MEMBER_FIELDS))
        .edge("TradeContract.buyer", Selection::new().fields(MEMBER_FIELDS))
        .edge("TradeContract.broker", Selection::new().fields(MEMBER_FIELDS))
        .edge(
            "TradeContract.productGoods",
            Selection::new()
                .fields([
                    "ProductGoods.name",
                    "ProductGoods.quantity",
                    "ProductGoods.hsCode",
                    "ProductGoods.originCountry",
                ])
                .edge(
                    "ProductGoods.commodityReference",
                    Selection::new().fields([
                        "CommodityReference.id",
                        "CommodityReference.symbol",
                        "CommodityReference.name",
                        "CommodityReference.category",
                    ]),
                ),
        )
}

/// Shape returned by search and traversal queries
pub fn contract_summary_selection() -> Selection {
    let party = || Selection::new().fields(["Member.id", "Member.companyName"]);
    Selection::new()
        .fields(CONTRACT_SCALARS)
        .edge("TradeContract.seller", party())
        .edge("TradeContract.buyer", party())
        .edge(
            "TradeContract.productGoods",
            Selection::new()
                .fields(["ProductGoods.name", "ProductGoods.quantity"])
                .edge(
                    "ProductGoods.commodityReference",
                    Selection::new().fields(["CommodityReference.name", "CommodityReference.category"]),
                ),
        )
}

#[derive(Debug, Default, Deserialize)]
struct CommodityNode {
    #[serde(default)]
    list: Vec<GoodsNode>,
}

#[derive(Debug, Default, Deserialize)]
struct GoodsNode {
    #[serde(default)]
    parent: Vec<TradeContract>,
}

#[derive(Debug, Default, Deserialize)]
struct PartyNode {
    #[serde(default)]
    as_seller: Vec<TradeContract>,
    #[serde(default)]
    as_buyer: Vec<TradeContract>,
}

/// Contract persistence with semantic search over generated descriptions
pub struct TradeContracts {
    store: Arc<EntityStore>,
    embedder: Arc<dyn Embedder>,
    default_limit: usize,
}

impl TradeContracts {
    pub fn new(store: Arc<EntityStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            default_limit: 5,
        }
    }

    /// Results returned by `search` when the caller gives no limit
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Describe, embed and write a contract with its nested parties and goods
    pub async fn upsert(&self, contract: &TradeContract) -> Result<HashMap<String, String>> {
        let mut contract = contract.clone();
        contract.description = describe_contract(&contract);

        // Validate before embedding
        let tree = EntityTree::from_entity(&contract)?;
        MutationBuilder::new(self.store.schema()).validate(CONTRACT_TYPE, &tree)?;

        let vector = self
            .embedder
            .embed(&contract.description)
            .await
            .map_err(GraphError::Embedding)?;

        let result = self
            .store
            .upsert(
                CONTRACT_TYPE,
                &tree,
                Some(EmbeddingField {
                    predicate: CONTRACT_EMBEDDING,
                    vector: &vector,
                }),
            )
            .await?;

        tracing::info!(id = %contract.id, "Trade contract stored");
        Ok(result.uids)
    }

    pub async fn get(&self, id: &str) -> Result<Option<TradeContract>> {
        self.store
            .get_by_key(CONTRACT_TYPE, id, &contract_selection())
            .await
    }

    /// Detach and clear the contract; members, goods and commodities stay
    pub async fn delete(&self, id: &str) -> Result<()> {
        let predicates: Vec<String> = CONTRACT_PREDICATES.iter().map(|p| p.to_string()).collect();
        self.store
            .delete_predicates(&Filter::eq(CONTRACT_ID, id), &predicates)
            .await
    }

    /// Contracts whose description is closest to `text`
    pub async fn search(&self, text: &str, limit: Option<usize>) -> Result<Vec<TradeContract>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(GraphError::Embedding)?;

        self.store
            .search(
                &vector,
                CONTRACT_EMBEDDING,
                &contract_summary_selection(),
                limit.unwrap_or(self.default_limit),
            )
            .await
    }

    /// Contracts whose goods reference the named commodity
    pub async fn by_commodity(&self, commodity: &str) -> Result<Vec<TradeContract>> {
        let selection = Selection::new().reverse(
            "ProductGoods.commodityReference",
            "list",
            Selection::new().reverse(
                "TradeContract.productGoods",
                "parent",
                contract_summary_selection(),
            ),
        );

        let nodes = self
            .store
            .connection()
            .query(&Filter::eq("CommodityReference.name", commodity), &selection)
            .await?;

        let mut contracts = Vec::new();
        for node in nodes {
            let node: CommodityNode = serde_json::from_value(node)?;
            contracts.extend(node.list.into_iter().flat_map(|goods| goods.parent));
        }
        Ok(contracts)
    }

    /// Contracts in the given status
    pub async fn by_status(&self, status: &str) -> Result<Vec<TradeContract>> {
        let nodes = self
            .store
            .connection()
            .query(
                &Filter::eq("TradeContract.status", status),
                &contract_summary_selection(),
            )
            .await?;

        nodes
            .into_iter()
            .map(|node| serde_json::from_value(node).map_err(GraphError::from))
            .collect()
    }

    /// Contracts naming the company as seller, then as buyer
    pub async fn by_company(&self, company: &str) -> Result<Vec<TradeContract>> {
        self.by_party(&Filter::eq("Member.companyName", company)).await
    }

    /// Contracts where the member is seller or buyer, seller side first
    pub async fn by_member(&self, member_id: &str) -> Result<Vec<TradeContract>> {
        self.by_party(&Filter::eq("Member.id", member_id)).await
    }

    async fn by_party(&self, members: &Filter) -> Result<Vec<TradeContract>> {
        let selection = Selection::new()
            .reverse("TradeContract.seller", "as_seller", contract_summary_selection())
            .reverse("TradeContract.buyer", "as_buyer", contract_summary_selection());

        let nodes = self.store.connection().query(members, &selection).await?;

        // A contract naming one member on both sides is listed once
        let mut seen = HashSet::new();
        let mut contracts = Vec::new();
        for node in nodes {
            let node: PartyNode = serde_json::from_value(node)?;
            for contract in node.as_seller.into_iter().chain(node.as_buyer) {
                if seen.insert(contract.id.clone()) {
                    contracts.push(contract);
                }
            }
        }
        Ok(contracts)
    }
}
