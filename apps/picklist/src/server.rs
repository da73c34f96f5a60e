//! # Fixture Backend
//!
//! Serves the page contract over a [`Dataset`] so pickers can run against a
//! real HTTP backend locally.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `POST /collections/{collection}/page`: body [`PageQuery`], answer
//!   [`PageRecords`]. Unknown or unloaded collections answer 404 with an
//!   empty record list.
//!
//! When an API key is configured, the page endpoint requires
//! `Authorization: Bearer <key>`, compared in constant time.

use crate::dataset::Dataset;
use crate::error::AppError;
use crate::fetcher::to_wire_record;
use crate::http::{HealthResponse, PageQuery, PageRecords};
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use picklist_core::Collection;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

// =============================================================================
// STATE
// =============================================================================

#[derive(Clone)]
pub struct ServerState {
    dataset: Arc<Dataset>,
    api_key: Option<Arc<str>>,
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("collections", &self.dataset.collections().collect::<Vec<_>>())
            .field("auth", &self.api_key.is_some())
            .finish()
    }
}

impl ServerState {
    #[must_use]
    pub fn new(dataset: Arc<Dataset>, api_key: Option<String>) -> Self {
        Self {
            dataset,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.api_key else {
            return true;
        };
        let provided = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        provided.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the fixture router.
pub fn router(state: ServerState) -> Router {
    let collections = Router::new()
        .route("/collections/{collection}/page", post(fetch_page))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(collections)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: ServerState) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "fixture backend listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("fixture backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    if state.authorized(request.headers()) {
        next.run(request).await
    } else {
        warn!(uri = %request.uri(), "rejected request without valid bearer token");
        (StatusCode::UNAUTHORIZED, Json(PageRecords::default())).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn fetch_page(
    State(state): State<ServerState>,
    Path(collection): Path<String>,
    Json(query): Json<PageQuery>,
) -> Response {
    let collection = match collection.parse::<Collection>() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "page request for unknown collection");
            return (StatusCode::NOT_FOUND, Json(PageRecords::default())).into_response();
        }
    };

    let request = query.into_request(collection);
    if let Err(e) = request.validate() {
        warn!(%collection, error = %e, "rejected page request");
        return (StatusCode::BAD_REQUEST, Json(PageRecords::default())).into_response();
    }

    match state.dataset.query(&request) {
        Some(records) => {
            debug!(%collection, page = request.page, count = records.len(), "page served");
            Json(PageRecords {
                records: records.iter().map(to_wire_record).collect(),
            })
            .into_response()
        }
        None => {
            warn!(%collection, "collection not loaded in dataset");
            (StatusCode::NOT_FOUND, Json(PageRecords::default())).into_response()
        }
    }
}
