use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use std::sync::Arc;

use tradegraph_core::config::Config;
use tradegraph_core::connection::GraphConnection;
use tradegraph_core::embedder::{Embedder, HashEmbedder, OpenAIEmbedder};
use tradegraph_core::error::GraphError;
use tradegraph_core::models::{ErrorResponse, SearchRequest, TradeContract, UpsertResponse};
use tradegraph_core::store::EntityStore;
use tradegraph_core::trade::{trade_schema, TradeContracts};
use tradegraph_core::{DgraphConnection, EmbeddingCache, MemoryGraph};

/// Shared application state
pub struct AppState {
    pub contracts: Arc<TradeContracts>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the store connection, embedder and contract service from config
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let conn: Arc<dyn GraphConnection> = if config.uses_memory_store() {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Arc::new(MemoryGraph::new())
        } else {
            Arc::new(DgraphConnection::new(
                config.dgraph_url.clone(),
                config.insecure_skip_verify,
            )?)
        };

        let schema = trade_schema();
        schema.validate()?;
        let store = EntityStore::new(Arc::new(schema), conn).with_resolution(config.resolution);

        let embedder: Arc<dyn Embedder> = if config.features.embedding {
            let mut emb = OpenAIEmbedder::new(
                config.embedding_url.clone(),
                config.embedding_model.clone(),
                config.embedding_dimensions,
                config.insecure_skip_verify,
            )?;

            if config.features.embedding_cache {
                let cache = EmbeddingCache::new(
                    config.embedding_model.clone(),
                    config.embedding_cache_capacity,
                );
                tracing::info!(
                    "✓ Embedding cache initialized ({} entries)",
                    config.embedding_cache_capacity
                );
                emb = emb.with_cache(Arc::new(cache));
            }
            Arc::new(emb)
        } else {
            tracing::info!("Remote embedding disabled, using local hash embedder");
            Arc::new(HashEmbedder::new(config.embedding_dimensions))
        };

        let contracts =
            TradeContracts::new(Arc::new(store), embedder).with_default_limit(config.search_top_k);

        Ok(Self {
            contracts: Arc::new(contracts),
            config: Arc::new(config),
        })
    }
}

/// Handler errors, rendered as `ErrorResponse` bodies
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("trade contract {0} not found")]
    NotFound(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Graph(e) => match e {
                GraphError::UnknownType(_) => "unknown_type",
                GraphError::MissingIdentity { .. } => "missing_identity",
                GraphError::AmbiguousKey { .. } => "ambiguous_key",
                GraphError::InvalidArgument(_) => "invalid_argument",
                GraphError::InvalidPayload(_) => "invalid_payload",
                GraphError::StoreUnavailable { .. }
                | GraphError::Store(_)
                | GraphError::Transport(_) => "store_error",
                GraphError::Embedding(_) => "embedding_failed",
                GraphError::Serialization(_) => "serialization_error",
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Graph(e) if e.is_caller_error() => StatusCode::BAD_REQUEST,
            ApiError::Graph(GraphError::AmbiguousKey { .. }) => StatusCode::CONFLICT,
            ApiError::Graph(
                GraphError::StoreUnavailable { .. }
                | GraphError::Store(_)
                | GraphError::Transport(_)
                | GraphError::Embedding(_),
            ) => StatusCode::BAD_GATEWAY,
            ApiError::Graph(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        })
    }
}

type ApiResult = Result<HttpResponse, ApiError>;

/// Health check
/// GET /health
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "store": state.config.store,
    }))
}

/// Create or update a trade contract
/// POST /contracts
#[tracing::instrument(skip(req, state), fields(id = %req.id))]
pub async fn upsert_contract(
    req: web::Json<TradeContract>,
    state: web::Data<AppState>,
) -> ApiResult {
    let contract = req.into_inner();
    let uids = state.contracts.upsert(&contract).await?;

    Ok(HttpResponse::Created().json(UpsertResponse {
        id: contract.id,
        uids,
    }))
}

/// Get a trade contract by id
/// GET /contracts/{id}
#[tracing::instrument(skip(path, state))]
pub async fn get_contract(path: web::Path<String>, state: web::Data<AppState>) -> ApiResult {
    let id = path.into_inner();
    tracing::debug!(id = %id, "Getting trade contract");

    match state.contracts.get(&id).await? {
        Some(contract) => Ok(HttpResponse::Ok().json(contract)),
        None => Err(ApiError::NotFound(id)),
    }
}

/// Delete a trade contract; shared members and goods are kept
/// DELETE /contracts/{id}
#[tracing::instrument(skip(path, state))]
pub async fn delete_contract(path: web::Path<String>, state: web::Data<AppState>) -> ApiResult {
    state.contracts.delete(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Semantic search over contract descriptions
/// POST /contracts/search
#[tracing::instrument(skip(req, state))]
pub async fn search_contracts(
    req: web::Json<SearchRequest>,
    state: web::Data<AppState>,
) -> ApiResult {
    let results = state.contracts.search(&req.query, req.limit).await?;
    tracing::debug!(results = results.len(), "Search complete");
    Ok(HttpResponse::Ok().json(results))
}

/// GET /contracts/by-commodity/{name}
#[tracing::instrument(skip(path, state))]
pub async fn contracts_by_commodity(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult {
    let results = state.contracts.by_commodity(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// GET /contracts/by-company/{name}
#[tracing::instrument(skip(path, state))]
pub async fn contracts_by_company(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult {
    let results = state.contracts.by_company(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// GET /contracts/by-status/{status}
#[tracing::instrument(skip(path, state))]
pub async fn contracts_by_status(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult {
    let results = state.contracts.by_status(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// GET /contracts/by-member/{id}
#[tracing::instrument(skip(path, state))]
pub async fn contracts_by_member(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> ApiResult {
    let results = state.contracts.by_member(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(results))
}

/// Configure routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/contracts")
            .route("", web::post().to(upsert_contract))
            // Specific routes before the {id} pattern
            .route("/search", web::post().to(search_contracts))
            .route("/by-commodity/{name}", web::get().to(contracts_by_commodity))
            .route("/by-company/{name}", web::get().to(contracts_by_company))
            .route("/by-status/{status}", web::get().to(contracts_by_status))
            .route("/by-member/{id}", web::get().to(contracts_by_member))
            .route("/{id}", web::get().to(get_contract))
            .route("/{id}", web::delete().to(delete_contract)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn state() -> web::Data<AppState> {
        let config = Config {
            store: "memory".to_string(),
            embedding_dimensions: 128,
            ..Default::default()
        };
        web::Data::new(AppState::from_config(config).unwrap())
    }

    fn contract_json(id: &str, seller: &str) -> Value {
        json!({
            "TradeContract.id": id,
            "TradeContract.contractNo": format!("TC-{}", id),
            "TradeContract.status": "ACTIVE",
            "TradeContract.seller": {"Member.id": "M1", "Member.companyName": seller},
            "TradeContract.buyer": {"Member.id": "M2", "Member.companyName": "Globex"},
            "TradeContract.productGoods": {
                "ProductGoods.name": "Premium Wheat",
                "ProductGoods.quantity": 5000,
                "ProductGoods.commodityReference": {
                    "CommodityReference.id": "WHEAT",
                    "CommodityReference.name": "Wheat"
                }
            },
            "TradeContract.fixedPrice": true,
            "TradeContract.pricingMethod": "FOB"
        })
    }

    #[actix_web::test]
    async fn test_contract_lifecycle() {
        let app =
            test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/contracts")
            .set_json(contract_json("C1", "Acme Grain"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], "C1");
        assert_eq!(body["uids"].as_object().unwrap().len(), 5);

        let req = test::TestRequest::get().uri("/contracts/C1").to_request();
        let contract: TradeContract = test::call_and_read_body_json(&app, req).await;
        assert_eq!(contract.seller.unwrap().company_name, "Acme Grain");

        let req = test::TestRequest::get()
            .uri("/contracts/by-company/Globex")
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.len(), 1);

        let req = test::TestRequest::post()
            .uri("/contracts/search")
            .set_json(json!({"query": "wheat", "limit": 3}))
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found[0].id, "C1");

        for _ in 0..2 {
            let req = test::TestRequest::delete().uri("/contracts/C1").to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }

        let req = test::TestRequest::get().uri("/contracts/C1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/contracts/by-commodity/Wheat")
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        assert!(found.is_empty());
    }

    #[actix_web::test]
    async fn test_contracts_by_status_and_member() {
        let app =
            test::init_service(App::new().app_data(state()).configure(configure)).await;

        let mut draft = contract_json("C2", "Initech");
        draft["TradeContract.status"] = json!("DRAFT");
        draft["TradeContract.seller"]["Member.id"] = json!("M3");
        for body in [contract_json("C1", "Acme Grain"), draft] {
            let req = test::TestRequest::post()
                .uri("/contracts")
                .set_json(body)
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/contracts/by-status/DRAFT")
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "C2");

        let req = test::TestRequest::get()
            .uri("/contracts/by-member/M2")
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<&str> = found.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);

        let req = test::TestRequest::get()
            .uri("/contracts/by-member/M3")
            .to_request();
        let found: Vec<TradeContract> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].seller.as_ref().unwrap().company_name, "Initech");
    }

    #[actix_web::test]
    async fn test_missing_identity_is_bad_request() {
        let app =
            test::init_service(App::new().app_data(state()).configure(configure)).await;

        let mut body = contract_json("C1", "Acme Grain");
        body["TradeContract.seller"]["Member.id"] = json!("");
        let req = test::TestRequest::post()
            .uri("/contracts")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let err: Value = test::read_body_json(resp).await;
        assert_eq!(err["error"], "missing_identity");
    }

    #[actix_web::test]
    async fn test_zero_limit_is_bad_request() {
        let app =
            test::init_service(App::new().app_data(state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/contracts/search")
            .set_json(json!({"query": "wheat", "limit": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[::core::prelude::v1::test]
    fn test_status_mapping() {
        let conflict = ApiError::from(GraphError::AmbiguousKey {
            node_type: "Member".to_string(),
            id_field: "Member.id".to_string(),
            value: json!("M1"),
            matches: 2,
        });
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let upstream = ApiError::from(GraphError::StoreUnavailable {
            status: 503,
            message: "down".to_string(),
        });
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);

        let unknown = ApiError::from(GraphError::UnknownType("Ship".to_string()));
        assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
    }
}
