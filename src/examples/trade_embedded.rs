//! Embedded Trade Graph Example
//!
//! Stores a few trade contracts in the in-memory graph, then reads them back
//! by id, commodity, company, status, member and semantic search.
//!
//! Run with: cargo run --example trade_embedded

use std::sync::Arc;
use tradegraph_core::*;

fn member(id: &str, name: &str) -> Member {
    Member {
        id: id.to_string(),
        company_name: name.to_string(),
        ..Default::default()
    }
}

fn goods(name: &str, commodity_id: &str, commodity: &str, quantity: i32, origin: &str) -> ProductGoods {
    ProductGoods {
        name: name.to_string(),
        quantity,
        origin_country: origin.to_string(),
        commodity_reference: Some(CommodityReference {
            id: commodity_id.to_string(),
            name: commodity.to_string(),
            category: "Agriculture".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Embedded tradegraph Example\n");

    let graph = Arc::new(MemoryGraph::new());
    let store = EntityStore::new(Arc::new(trade_schema()), graph.clone())
        .with_resolution(ResolutionMode::SerializedPerKey);
    let contracts = TradeContracts::new(Arc::new(store), Arc::new(HashEmbedder::new(256)));
    println!("✅ Store initialized\n");

    let acme = member("M1", "Acme Grain");
    let globex = member("M2", "Globex");

    let samples = [
        TradeContract {
            id: "C1".to_string(),
            contract_no: "TC-001".to_string(),
            contract_date: "2024-01-15".to_string(),
            status: "ACTIVE".to_string(),
            seller: Some(acme.clone()),
            buyer: Some(globex.clone()),
            product_goods: Some(goods("Premium Wheat", "WHEAT", "Wheat", 5000, "USA")),
            fixed_price: true,
            pricing_method: "FOB".to_string(),
            ..Default::default()
        },
        TradeContract {
            id: "C2".to_string(),
            contract_no: "TC-002".to_string(),
            contract_date: "2024-02-01".to_string(),
            status: "DRAFT".to_string(),
            seller: Some(globex),
            buyer: Some(acme),
            product_goods: Some(goods("Arabica Beans", "COFFEE", "Coffee", 1200, "Brazil")),
            pricing_method: "Index plus premium".to_string(),
            ..Default::default()
        },
    ];

    for contract in &samples {
        let uids = contracts.upsert(contract).await?;
        println!("📝 Stored {} ({} new nodes)", contract.id, uids.len());
    }
    println!("   Graph holds {} nodes\n", graph.node_count());

    if let Some(c1) = contracts.get("C1").await? {
        println!("📄 C1: {}\n", c1.description);
    }

    println!("🌾 Contracts for Wheat:");
    for c in contracts.by_commodity("Wheat").await? {
        println!("   {} ({})", c.id, c.status);
    }

    println!("\n🏢 Contracts involving Globex:");
    for c in contracts.by_company("Globex").await? {
        println!("   {} ({})", c.id, c.contract_no);
    }

    println!("\n📋 Draft contracts:");
    for c in contracts.by_status("DRAFT").await? {
        println!("   {} ({})", c.id, c.contract_no);
    }

    println!("\n👤 Contracts for member M1:");
    for c in contracts.by_member("M1").await? {
        println!("   {} ({})", c.id, c.status);
    }

    println!("\n🔍 Search results for 'coffee from Brazil':");
    for (i, c) in contracts
        .search("coffee from Brazil", Some(2))
        .await?
        .iter()
        .enumerate()
    {
        println!("   {}. {} - {}", i + 1, c.id, c.description);
    }

    contracts.delete("C1").await?;
    println!(
        "\n🗑  Deleted C1; Acme still trades in {} contract(s)",
        contracts.by_company("Acme Grain").await?.len()
    );

    Ok(())
}
