use crate::{
    api::{
        cors::add_cors_headers,
        router::{error_response, json_response, AppState},
    },
    catalog,
    db::new_id,
    models::{CurrentUser, Song, SongEdit},
};

use axum::{
    body::Body,
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use sqlx::{query, query_as};

type HandlerError = (StatusCode, &'static str);

// caller's songs, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Response<Body> {
    let result = query_as::<_, Song>(
        "SELECT * FROM songs WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.pool)
    .await;

    match result {
        Ok(songs) => {
            let mut resp = Json(songs).into_response();
            add_cors_headers(&mut resp);
            resp
        }
        Err(e) => {
            eprintln!("database error in list(): {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "query failed")
        }
    }
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Response<Body> {
    match async {
        let mut title = String::new();
        let mut artist = String::new();
        let mut duration = String::new();
        let mut file: Option<(String, Vec<u8>)> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "malformed multipart body"))?
        {
            let field_name = field.name().unwrap_or("").to_string();
            match field_name.as_str() {
                "title" => {
                    title = field
                        .text()
                        .await
                        .map_err(|_| (StatusCode::BAD_REQUEST, "malformed multipart body"))?;
                }
                "artist" => {
                    artist = field
                        .text()
                        .await
                        .map_err(|_| (StatusCode::BAD_REQUEST, "malformed multipart body"))?;
                }
                "duration" => {
                    duration = field
                        .text()
                        .await
                        .map_err(|_| (StatusCode::BAD_REQUEST, "malformed multipart body"))?;
                }
                "file" => {
                    let name = field.file_name().unwrap_or("upload").to_string();
                    // a read error here is the body limit tripping
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|_| (StatusCode::PAYLOAD_TOO_LARGE, "file too large"))?;
                    file = Some((name, bytes.to_vec()));
                }
                _ => {}
            }
        }

        let title = title.trim();
        let artist = artist.trim();
        let duration = duration.trim();
        if title.is_empty() || artist.is_empty() || duration.is_empty() {
            return Err((
                StatusCode::BAD_REQUEST,
                "title, artist and duration are required",
            ));
        }

        let (filename, bytes) =
            file.ok_or((StatusCode::BAD_REQUEST, "an audio file is required"))?;

        if bytes.len() > state.max_upload_bytes {
            return Err((StatusCode::PAYLOAD_TOO_LARGE, "file too large"));
        }

        let song = create_song(&state, &user, title, artist, duration, &filename, &bytes).await?;

        let mut resp = (StatusCode::CREATED, Json(song)).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

// asset first, row second. if the row doesn't make it, the asset comes back
// out of the store before we report the failure
pub async fn create_song(
    state: &AppState,
    user: &CurrentUser,
    title: &str,
    artist: &str,
    duration: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<Song, HandlerError> {
    let stored = state.assets.store(filename, bytes).await.map_err(|e| {
        eprintln!("asset store failed: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "could not store audio file",
        )
    })?;

    let id = new_id();
    let insert = query(
        "INSERT INTO songs (id, title, artist, duration, file_path, asset_id, user_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(title)
    .bind(artist)
    .bind(duration)
    .bind(&stored.file_path)
    .bind(&stored.asset_id)
    .bind(&user.id)
    .execute(&state.pool)
    .await;

    if let Err(e) = insert {
        eprintln!("song insert failed: {e}");
        // best effort release; a cleanup failure is only logged
        if let Err(e) = state.assets.delete(&stored.asset_id).await {
            eprintln!("asset cleanup failed for {}: {e}", stored.asset_id);
        }
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "could not save song"));
    }

    query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "could not save song"))
}

// title/artist only; duration and file path are frozen at upload time
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(edit): Json<SongEdit>,
) -> Response<Body> {
    match async {
        // catalog entries aren't persisted: accept the edit, scope it to the
        // caller's own view, touch nothing shared
        if let Some(pre) = catalog::lookup(&id) {
            let mut echoed = serde_json::json!(pre);
            if let Some(title) = non_empty(edit.title.as_deref()) {
                echoed["title"] = title.into();
            }
            if let Some(artist) = non_empty(edit.artist.as_deref()) {
                echoed["artist"] = artist.into();
            }
            return Ok(json_response(StatusCode::OK, echoed));
        }

        // absent and not-yours look identical on purpose
        let song = fetch_owned(&state, &id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "song not found"))?;

        let title = non_empty(edit.title.as_deref()).unwrap_or(song.title);
        let artist = non_empty(edit.artist.as_deref()).unwrap_or(song.artist);

        query("UPDATE songs SET title = ?, artist = ? WHERE id = ? AND user_id = ?")
            .bind(&title)
            .bind(&artist)
            .bind(&id)
            .bind(&user.id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let updated = query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(&id)
            .fetch_one(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let mut resp = Json(updated).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Response<Body> {
    match async {
        if catalog::lookup(&id).is_some() {
            // nothing to delete server-side
            return Ok(json_response(
                StatusCode::OK,
                serde_json::json!({ "message": "Song deleted successfully" }),
            ));
        }

        let song = fetch_owned(&state, &id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "song not found"))?;

        // release the stored asset first, but a miss there never blocks the
        // row delete
        if let Some(asset_id) = &song.asset_id {
            if let Err(e) = state.assets.delete(asset_id).await {
                eprintln!("asset delete failed for {asset_id}: {e}");
            }
        }

        query("DELETE FROM songs WHERE id = ? AND user_id = ?")
            .bind(&id)
            .bind(&user.id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        Ok(json_response(
            StatusCode::OK,
            serde_json::json!({ "message": "Song deleted successfully" }),
        ))
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

async fn fetch_owned(
    state: &AppState,
    id: &str,
    user_id: &str,
) -> Result<Option<Song>, HandlerError> {
    query_as::<_, Song>("SELECT * FROM songs WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
