//! HTTP+JSON RPC surface. `axum` extractors replace a hand-rolled socket
//! loop; every mutating route funnels straight into the shared chain
//! engine, matching the "every public store operation is a single atomic
//! transaction" model from the concurrency design.

use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chainlib::error::ChainError;
use chainlib::hash::Hash;
use chainlib::peer::Peer;
use chainlib::store::{BlockStore, MempoolStore, PeerStore};
use chainlib::types::{HashedBlock, SignedTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(directory))
        .route("/block", get(get_block).post(post_block))
        .route("/transaction", get(get_transactions).post(post_transaction))
        .route("/peer", get(get_peers).post(post_peers))
        .route("/chain", get(get_chain))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn directory() -> Json<Value> {
    Json(json!({
        "routes": ["/block", "/transaction", "/peer", "/chain"],
    }))
}

#[derive(Deserialize, Default)]
struct BlockQuery {
    #[serde(default)]
    hex_hash: Option<String>,
    #[serde(default)]
    block_num: Option<u64>,
    #[serde(default)]
    parent_hex_hash: Option<String>,
}

async fn get_block(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BlockQuery>,
) -> impl IntoResponse {
    let engine = &state.engine;
    let lookup: chainlib::error::Result<Value> = (|| {
        if let Some(hex) = query.hex_hash {
            let hash = Hash::from_hex(&hex).map_err(|e| ChainError::invalid_block(e.to_string()))?;
            return Ok(match engine.blocks().get_by_hash(&hash)? {
                Some(b) => serde_json::to_value(b).unwrap(),
                None => json!({}),
            });
        }
        if let Some(num) = query.block_num {
            let blocks = engine.blocks().get_by_block_num(num)?;
            return Ok(json!({ "blocks": blocks }));
        }
        if let Some(hex) = query.parent_hex_hash {
            let hash = Hash::from_hex(&hex).map_err(|e| ChainError::invalid_block(e.to_string()))?;
            let blocks = engine.blocks().get_by_parent_hash(&hash)?;
            return Ok(json!({ "blocks": blocks }));
        }
        Ok(json!({ "blocks": [] }))
    })();

    match lookup {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "msg": e.to_string() }))).into_response(),
    }
}

async fn post_block(State(state): State<Arc<AppState>>, Json(hb): Json<HashedBlock>) -> impl IntoResponse {
    let already_stored = state.engine.blocks().has_hash(&hb.mining_hash()).unwrap_or(false);
    match state.engine.add_block(hb) {
        Ok(()) if already_stored => (StatusCode::OK, Json(json!({ "msg": "duplicate" }))).into_response(),
        Ok(()) => (StatusCode::OK, Json(json!({ "msg": "accepted" }))).into_response(),
        Err(ChainError::UnknownParent { parent_hash }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "msg": format!("unknown parent {parent_hash}") })),
        )
            .into_response(),
        Err(e) => {
            warn!("block rejected: {e}");
            (StatusCode::BAD_REQUEST, Json(json!({ "msg": e.to_string() }))).into_response()
        }
    }
}

async fn get_transactions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.mempool().get_all() {
        Ok(txns) => (StatusCode::OK, Json(json!({ "transactions": txns }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "msg": e.to_string() }))).into_response(),
    }
}

async fn post_transaction(
    State(state): State<Arc<AppState>>,
    Json(txn): Json<SignedTransaction>,
) -> impl IntoResponse {
    match state.engine.add_outstanding_transaction(txn) {
        Ok(()) => (StatusCode::OK, Json(json!({ "msg": "accepted" }))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "msg": e.to_string() }))).into_response(),
    }
}

async fn get_peers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.peers.get_all_active_peers() {
        Ok(peers) => (StatusCode::OK, Json(json!({ "peers": peers, "peer_id": state.peer_id }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "msg": e.to_string() }))).into_response(),
    }
}

#[derive(Deserialize)]
struct PeerList {
    peers: Vec<Peer>,
}

async fn post_peers(State(state): State<Arc<AppState>>, Json(body): Json<PeerList>) -> impl IntoResponse {
    for peer in body.peers {
        if peer.peer_id == state.peer_id {
            continue;
        }
        if let Err(e) = state.peers.add_peer(peer) {
            warn!("failed to merge peer: {e}");
        }
    }
    Json(json!({ "msg": "merged" }))
}

#[derive(Serialize)]
struct HashHex {
    sha256_hex: String,
}

async fn get_chain(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.engine.get_head() {
        Ok(Some(head)) => (
            StatusCode::OK,
            Json(json!({
                "height": head.block_num(),
                "head_hash": HashHex { sha256_hex: head.mining_hash().to_hex() },
            })),
        )
            .into_response(),
        Ok(None) => (StatusCode::OK, Json(json!({ "height": 0, "head_hash": Value::Null }))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "msg": e.to_string() }))).into_response(),
    }
}

pub async fn serve(listen_port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{listen_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
