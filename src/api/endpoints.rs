use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::query;
use std::path::Component;
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::{
    api::{
        cors::add_cors_headers,
        router::{json_response, status_response, AppState},
    },
    catalog,
};

// liveness plus an actual database probe
pub async fn health(State(state): State<AppState>) -> Response<Body> {
    let database = match query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "status": "OK",
            "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            "database": database,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

// service banner
pub async fn index() -> Response<Body> {
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "message": "Gerardify Backend API",
            "status": "Running",
            "endpoints": [
                "GET /api/health",
                "GET /api/songs",
                "POST /api/songs",
                "GET /api/playlists",
                "POST /api/playlists",
                "GET /api/playlists/:id",
                "GET /api/preloaded-songs",
            ],
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

// the baked-in sample catalog, no auth
pub async fn preloaded() -> Response<Body> {
    let mut resp = Json(catalog::CATALOG).into_response();
    add_cors_headers(&mut resp);
    resp
}

// stream stored audio back out. the capture arrives percent-decoded already
pub async fn media(State(state): State<AppState>, Path(path): Path<String>) -> Response<Body> {
    if path.is_empty() {
        return status_response(StatusCode::NOT_FOUND);
    }

    // plain relative segments only: a rooted path would make join() throw
    // away the media dir, and `..` climbs out of it
    let safe = !path.starts_with('/')
        && std::path::Path::new(&path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return status_response(StatusCode::FORBIDDEN);
    }

    let filepath = state.media_dir.join(&path);
    let file = match fs::File::open(&filepath).await {
        Ok(f) => f,
        Err(_) => return status_response(StatusCode::NOT_FOUND),
    };

    let metadata = match file.metadata().await {
        Ok(m) => m,
        Err(_) => return status_response(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let body = Body::from_stream(ReaderStream::new(file));

    let content_type = match path.rsplit('.').next() {
        Some("ogg") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    };

    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .unwrap();

    add_cors_headers(&mut response);
    response
}
