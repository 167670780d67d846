use crate::{
    api::{
        cors::add_cors_headers,
        router::{error_response, json_response, AppState},
    },
    catalog::{self, Track},
    models::{AddSongRequest, CurrentUser, Playlist, PlaylistCreate, PlaylistEdit, PlaylistEntry, Song},
};

use axum::{
    body::Body,
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{Datelike, Utc};
use sqlx::{query, query_as, query_scalar};

type HandlerError = (StatusCode, &'static str);

// public ids come in as path strings; anything non-numeric is a 400
fn parse_id(raw: &str) -> Result<i64, HandlerError> {
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "invalid playlist id format"))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Response<Body> {
    match async {
        let mut playlists = query_as::<_, Playlist>(
            "SELECT * FROM playlists WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(&user.id)
        .fetch_all(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "query failed"))?;

        for playlist in &mut playlists {
            playlist.songs = load_entries(&state, playlist.id).await?;
        }

        let mut resp = Json(playlists).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PlaylistCreate>,
) -> Response<Body> {
    match async {
        let name = req.name.trim();
        let artist = req.artist.trim();
        if name.is_empty() || artist.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "name and artist are required"));
        }

        // allocate the next public id inside the insert so two creates can't
        // race into the same one
        let id: i64 = query_scalar(
            "INSERT INTO playlists (id, name, artist, year, user_id)
             VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM playlists), ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(name)
        .bind(artist)
        .bind(Utc::now().year() as i64)
        .bind(&user.id)
        .fetch_one(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "could not create playlist"))?;

        let playlist = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "could not create playlist"))?;

        let mut resp = (StatusCode::CREATED, Json(playlist)).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn get_one(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
) -> Response<Body> {
    match async {
        let id = parse_id(&raw)?;
        let playlist = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        let mut resp = Json(playlist).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

// rename / artist change only
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
    Json(edit): Json<PlaylistEdit>,
) -> Response<Body> {
    match async {
        let id = parse_id(&raw)?;
        let playlist = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        let name = non_empty(edit.name.as_deref()).unwrap_or(playlist.name);
        let artist = non_empty(edit.artist.as_deref()).unwrap_or(playlist.artist);

        query("UPDATE playlists SET name = ?, artist = ? WHERE id = ? AND user_id = ?")
            .bind(&name)
            .bind(&artist)
            .bind(id)
            .bind(&user.id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let updated = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

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
    Path(raw): Path<String>,
) -> Response<Body> {
    match async {
        let id = parse_id(&raw)?;

        let deleted = query("DELETE FROM playlists WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(&user.id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
            .rows_affected();

        if deleted == 0 {
            return Err((StatusCode::NOT_FOUND, "playlist not found"));
        }

        // snapshots go with the playlist
        query("DELETE FROM playlist_songs WHERE playlist_id = ?")
            .bind(id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        Ok(json_response(
            StatusCode::OK,
            serde_json::json!({ "message": "Playlist deleted successfully" }),
        ))
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

pub async fn add_song(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(raw): Path<String>,
    Json(req): Json<AddSongRequest>,
) -> Response<Body> {
    match async {
        let id = parse_id(&raw)?;
        fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        // resolve the reference at the boundary: the caller's own song or a
        // read-only catalog entry
        let track = match catalog::lookup(&req.song_id) {
            Some(pre) => Track::Preloaded(pre),
            None => {
                let song = query_as::<_, Song>("SELECT * FROM songs WHERE id = ? AND user_id = ?")
                    .bind(&req.song_id)
                    .bind(&user.id)
                    .fetch_optional(&state.pool)
                    .await
                    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
                    .ok_or((StatusCode::NOT_FOUND, "song not found"))?;
                Track::Owned(song)
            }
        };

        // duplicate adds are caller errors, not ignored
        let already = query("SELECT 1 FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
            .bind(id)
            .bind(track.id())
            .fetch_optional(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?
            .is_some();

        if already {
            return Err((StatusCode::BAD_REQUEST, "song already in playlist"));
        }

        let position: i64 = query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM playlist_songs WHERE playlist_id = ?",
        )
        .bind(id)
        .fetch_one(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        // snapshot, not a live reference. if the song gets edited later this
        // copy stays as it was at add time
        query(
            "INSERT INTO playlist_songs (playlist_id, song_id, title, artist, duration, file_path, position)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(track.id())
        .bind(track.title())
        .bind(track.artist())
        .bind(track.duration())
        .bind(track.file_path())
        .bind(position)
        .execute(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let playlist = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        let mut resp = Json(playlist).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

// removing an id that isn't in the list is a silent no-op
pub async fn remove_song(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((raw, song_id)): Path<(String, String)>,
) -> Response<Body> {
    match async {
        let id = parse_id(&raw)?;
        fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        query("DELETE FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
            .bind(id)
            .bind(&song_id)
            .execute(&state.pool)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

        let playlist = fetch_owned(&state, id, &user.id)
            .await?
            .ok_or((StatusCode::NOT_FOUND, "playlist not found"))?;

        let mut resp = Json(playlist).into_response();
        add_cors_headers(&mut resp);
        Ok(resp)
    }
    .await
    {
        Ok(resp) => resp,
        Err((status, msg)) => error_response(status, msg),
    }
}

async fn fetch_owned(
    state: &AppState,
    id: i64,
    user_id: &str,
) -> Result<Option<Playlist>, HandlerError> {
    let playlist = query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))?;

    match playlist {
        Some(mut playlist) => {
            playlist.songs = load_entries(state, playlist.id).await?;
            Ok(Some(playlist))
        }
        None => Ok(None),
    }
}

async fn load_entries(state: &AppState, playlist_id: i64) -> Result<Vec<PlaylistEntry>, HandlerError> {
    query_as::<_, PlaylistEntry>(
        "SELECT song_id, title, artist, duration, file_path, position
         FROM playlist_songs WHERE playlist_id = ? ORDER BY position",
    )
    .bind(playlist_id)
    .fetch_all(&state.pool)
    .await
    .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "database error"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
