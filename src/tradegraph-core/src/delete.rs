use crate::connection::{validate_predicate, Filter, GraphConnection, TYPE_PREDICATE, UID};
use crate::error::{GraphError, Result};

/// Remove exactly `predicates` from every node matching `filter`.
///
/// Edges listed here are cut at the matched node; the nodes they pointed to
/// are never visited, so shared nodes survive. A filter matching nothing is a
/// successful no-op, as is an empty predicate list (which skips the store).
/// Every match is affected, so callers wanting a single root must use a
/// filter on a unique key.
pub async fn delete_predicates(
    conn: &dyn GraphConnection,
    filter: &Filter,
    predicates: &[String],
) -> Result<()> {
    validate_predicate(filter.predicate())?;
    for predicate in predicates {
        validate_predicate(predicate)?;
        if predicate == UID {
            return Err(GraphError::InvalidArgument(
                "uid is not a deletable predicate".to_string(),
            ));
        }
    }

    if predicates.is_empty() {
        tracing::debug!(filter = ?filter, "No predicates to delete");
        return Ok(());
    }

    conn.delete_predicates(filter, predicates).await?;

    tracing::info!(
        filter = ?filter,
        predicates = predicates.len(),
        type_tag_removed = predicates.iter().any(|p| p == TYPE_PREDICATE),
        "Predicates deleted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Selection;
    use crate::memory::MemoryGraph;
    use serde_json::json;

    fn owned() -> Vec<String> {
        ["Contract.id", "Contract.status", "Contract.party", "Contract.embedding"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    async fn seeded() -> MemoryGraph {
        let graph = MemoryGraph::new();
        for (contract, status) in [("C1", "ACTIVE"), ("C2", "DRAFT")] {
            graph
                .mutate(&json!({
                    "uid": "_:c",
                    "dgraph.type": "Contract",
                    "Contract.id": contract,
                    "Contract.status": status,
                    "Contract.embedding": [1.0, 0.0],
                    "Contract.party": {"uid": "_:p", "dgraph.type": "Party", "Party.id": format!("P-{}", contract)},
                }))
                .await
                .unwrap();
        }
        // both contracts now share one counterparty
        let p1 = graph
            .query(&Filter::eq("Party.id", "P-C1"), &Selection::new().uid())
            .await
            .unwrap();
        let c2 = graph
            .query(&Filter::eq("Contract.id", "C2"), &Selection::new().uid())
            .await
            .unwrap();
        graph
            .mutate(&json!({"uid": c2[0]["uid"], "Contract.party": {"uid": p1[0]["uid"]}}))
            .await
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let graph = seeded().await;

        delete_predicates(&graph, &Filter::eq("Contract.id", "C1"), &owned())
            .await
            .unwrap();

        let c1 = graph
            .query(&Filter::eq("Contract.id", "C1"), &Selection::new().uid())
            .await
            .unwrap();
        assert!(c1.is_empty());

        let party = graph
            .query(
                &Filter::eq("Party.id", "P-C1"),
                &Selection::new().field("Party.id"),
            )
            .await
            .unwrap();
        assert_eq!(party, vec![json!({"Party.id": "P-C1"})]);

        let c2 = graph
            .query(
                &Filter::eq("Contract.id", "C2"),
                &Selection::new()
                    .field("Contract.status")
                    .edge("Contract.party", Selection::new().field("Party.id")),
            )
            .await
            .unwrap();
        assert_eq!(c2[0]["Contract.party"]["Party.id"], "P-C1");
    }

    #[tokio::test]
    async fn test_delete_twice_is_noop() {
        let graph = seeded().await;
        let filter = Filter::eq("Contract.id", "C1");

        delete_predicates(&graph, &filter, &owned()).await.unwrap();
        delete_predicates(&graph, &filter, &owned()).await.unwrap();

        let nearest = graph
            .nearest("Contract.embedding", &[1.0, 0.0], 10, &Selection::new().field("Contract.id"))
            .await
            .unwrap();
        assert_eq!(nearest, vec![json!({"Contract.id": "C2"})]);
    }

    #[tokio::test]
    async fn test_delete_matching_nothing() {
        let graph = seeded().await;
        delete_predicates(&graph, &Filter::eq("Contract.id", "C9"), &owned())
            .await
            .unwrap();
        assert_eq!(graph.node_count(), 4);
    }

    #[tokio::test]
    async fn test_bulk_filter_affects_all_matches() {
        let graph = seeded().await;
        delete_predicates(&graph, &Filter::has("Contract.status"), &["Contract.status".to_string()])
            .await
            .unwrap();

        let remaining = graph
            .query(&Filter::has("Contract.status"), &Selection::new().uid())
            .await
            .unwrap();
        assert!(remaining.is_empty());
        let contracts = graph
            .query(&Filter::has("Contract.id"), &Selection::new().uid())
            .await
            .unwrap();
        assert_eq!(contracts.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_list_skips_store() {
        let graph = MemoryGraph::new();
        delete_predicates(&graph, &Filter::eq("Contract.id", "C1"), &[])
            .await
            .unwrap();
        assert_eq!(graph.stats().total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_predicates_rejected() {
        let graph = MemoryGraph::new();
        let filter = Filter::eq("Contract.id", "C1");

        for bad in ["uid", "Contract.id> * .", ""] {
            let err = delete_predicates(&graph, &filter, &[bad.to_string()])
                .await
                .unwrap_err();
            assert!(matches!(err, GraphError::InvalidArgument(_)));
        }
        assert_eq!(graph.stats().total(), 0);
    }
}
