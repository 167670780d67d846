use std::{path::PathBuf, sync::Arc};

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, Response, StatusCode},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::SqlitePool;

use crate::{
    api::{
        cors::add_cors_headers,
        endpoints::{health, index, media, preloaded},
        login::{login, me, register, require_auth},
        playlists, songs,
    },
    assets::AssetStore,
};

// everything the handlers share
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub assets: Arc<dyn AssetStore>,
    pub media_dir: PathBuf,
    pub max_upload_bytes: usize,
}

// every error leaves as {"message": ...} json
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    let body = serde_json::json!({ "message": message });

    let mut resp = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    add_cors_headers(&mut resp);
    resp
}

/// helper response
pub fn status_response(status: StatusCode) -> Response<Body> {
    error_response(status, status.canonical_reason().unwrap_or("Error"))
}

pub fn json_response(status: StatusCode, value: serde_json::Value) -> Response<Body> {
    let mut resp = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap();

    add_cors_headers(&mut resp);
    resp
}

/// router definition
pub fn route(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/songs", get(songs::list).post(songs::upload))
        .route("/api/songs/{id}", put(songs::update).delete(songs::remove))
        .route(
            "/api/playlists",
            get(playlists::list).post(playlists::create),
        )
        .route(
            "/api/playlists/{id}",
            get(playlists::get_one)
                .put(playlists::update)
                .delete(playlists::remove),
        )
        .route("/api/playlists/{id}/songs", post(playlists::add_song))
        .route(
            "/api/playlists/{id}/songs/{song_id}",
            delete(playlists::remove_song),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/preloaded-songs", get(preloaded))
        .route("/media/{*path}", get(media))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .merge(gated)
        // slack over the song cap so we can answer oversize uploads ourselves
        .layer(DefaultBodyLimit::max(state.max_upload_bytes + 1024 * 1024))
        .fallback(|| async { status_response(StatusCode::NOT_FOUND) })
        .with_state(state)
}
