//! Thin HTTP transport over [`RangeLookup`].
//!
//! `GET /?sku=<key>&rank=<threshold>` answers with a JSON array of
//! `[value, rank]` pairs: `200` when something matched, `400` when the list
//! is empty. `GET /stats` reports the catalog size.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::index::RangeLookup;

#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    pub sku: Option<String>,
    pub rank: Option<String>,
}

impl LookupParams {
    /// Missing `sku` is the empty key; a missing or unparseable `rank` is `0.0`.
    pub fn resolve(&self) -> (&str, f64) {
        let key = self.sku.as_deref().unwrap_or("");
        let rank = self
            .rank
            .as_deref()
            .and_then(|r| r.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        (key, rank)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub index_size: usize,
    pub record_width: usize,
}

pub fn router(lookup: Arc<RangeLookup>) -> Router {
    Router::new()
        .route("/", get(handle_lookup))
        .route("/stats", get(handle_stats))
        .with_state(lookup)
}

pub async fn serve(lookup: Arc<RangeLookup>, listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Serving {} keys on http://{}", lookup.index_size(), listener.local_addr()?);
    axum::serve(listener, router(lookup)).await?;
    Ok(())
}

pub async fn handle_lookup(
    State(lookup): State<Arc<RangeLookup>>,
    Query(params): Query<LookupParams>,
) -> Response {
    let (key, rank) = params.resolve();
    let key = key.to_string();
    debug!("lookup sku={:?} rank={}", key, rank);

    let result = tokio::task::spawn_blocking(move || lookup.lookup(&key, rank)).await;

    match result {
        Ok(Ok(pairs)) => {
            let status = if pairs.is_empty() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(pairs)).into_response()
        }
        Ok(Err(e)) => {
            error!("Lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::<(String, f64)>::new())).into_response()
        }
        Err(e) => {
            error!("Lookup task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn handle_stats(State(lookup): State<Arc<RangeLookup>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        index_size: lookup.index_size(),
        record_width: lookup.catalog().record_width(),
    })
}
