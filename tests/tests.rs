// integration tests against an in-memory database
use gerardify as app;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Json, Path, State},
    http::{HeaderMap, Request, StatusCode},
    response::Response,
    Extension,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use app::{
    api::{login, playlists, router::AppState, songs},
    assets::{AssetStore, StoredAsset},
    models::{
        AddSongRequest, CurrentUser, LoginRequest, PlaylistCreate, PlaylistEdit, RegisterRequest,
        SongEdit,
    },
};

// asset store that just keeps everything in memory and records deletes, so
// the compensation path is observable
#[derive(Default)]
struct MemStore {
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetStore for MemStore {
    async fn store(&self, filename: &str, _bytes: &[u8]) -> Result<StoredAsset> {
        let mut stored = self.stored.lock().unwrap();
        let asset_id = format!("{}-{}", stored.len(), filename);
        stored.push(asset_id.clone());
        Ok(StoredAsset {
            file_path: format!("/media/{asset_id}"),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<()> {
        self.stored.lock().unwrap().retain(|a| a != asset_id);
        self.deleted.lock().unwrap().push(asset_id.to_string());
        Ok(())
    }
}

async fn make_state() -> (AppState, Arc<MemStore>) {
    // one connection only, otherwise every pool checkout sees a different
    // in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect db");
    app::db::init(&pool).await.expect("init db");

    let store = Arc::new(MemStore::default());
    let state = AppState {
        pool,
        assets: store.clone(),
        media_dir: PathBuf::from("./media"),
        max_upload_bytes: 1024,
    };
    (state, store)
}

async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn register(state: &AppState, username: &str, email: &str) -> (CurrentUser, String) {
    let resp = login::register(
        State(state.clone()),
        Json(RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter2".to_string(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    let token = body["token"].as_str().expect("token").to_string();
    let user = CurrentUser {
        id: body["user"]["id"].as_str().expect("user id").to_string(),
        username: username.to_string(),
    };
    (user, token)
}

async fn add_owned_song(state: &AppState, user: &CurrentUser, title: &str) -> String {
    let song = songs::create_song(state, user, title, "tester", "3:05", "take.mp3", b"riff")
        .await
        .expect("create song");
    song.id
}

// ---- auth ----

#[tokio::test]
async fn register_token_round_trips_to_the_same_user() {
    let (state, _) = make_state().await;
    let (user, token) = register(&state, "edgeuser", "edge@example.com").await;

    let mut headers = HeaderMap::new();
    headers.insert("authorization", format!("Bearer {token}").parse().unwrap());

    let verified = login::verify(&state, &headers).await.expect("valid token");
    assert_eq!(verified.id, user.id);
    assert_eq!(verified.username, "edgeuser");
}

#[tokio::test]
async fn duplicate_username_or_email_is_rejected() {
    let (state, _) = make_state().await;
    register(&state, "edgeuser", "edge@example.com").await;

    for (username, email) in [
        ("edgeuser", "other@example.com"),
        ("otheruser", "edge@example.com"),
    ] {
        let resp = login::register(
            State(state.clone()),
            Json(RegisterRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: "hunter2".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn login_is_generic_about_what_went_wrong() {
    let (state, _) = make_state().await;
    register(&state, "edgeuser", "edge@example.com").await;

    // wrong password and unknown email read exactly the same
    for (email, password) in [
        ("edge@example.com", "badpass"),
        ("nobody@example.com", "hunter2"),
    ] {
        let resp = login::login(
            State(state.clone()),
            Json(LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "invalid credentials");
    }

    let resp = login::login(
        State(state.clone()),
        Json(LoginRequest {
            email: "edge@example.com".to_string(),
            password: "hunter2".to_string(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_and_garbage_tokens_are_unauthorized() {
    let (state, _) = make_state().await;

    let empty = HeaderMap::new();
    let err = login::verify(&state, &empty).await.unwrap_err();
    assert_eq!(err.0, StatusCode::UNAUTHORIZED);

    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Bearer not-a-jwt".parse().unwrap());
    let err = login::verify(&state, &headers).await.unwrap_err();
    assert_eq!(err.0, StatusCode::UNAUTHORIZED);
}

// ---- songs ----

#[tokio::test]
async fn song_listing_never_crosses_owners() {
    let (state, _) = make_state().await;
    let (alice, _) = register(&state, "alice", "alice@example.com").await;
    let (bob, _) = register(&state, "bob", "bob@example.com").await;

    add_owned_song(&state, &alice, "hers").await;
    add_owned_song(&state, &bob, "his").await;

    let resp = songs::list(State(state.clone()), Extension(alice.clone())).await;
    let body = body_json(resp).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["hers"]);
}

#[tokio::test]
async fn songs_list_newest_first() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;

    add_owned_song(&state, &user, "first").await;
    add_owned_song(&state, &user, "second").await;
    add_owned_song(&state, &user, "third").await;

    let resp = songs::list(State(state.clone()), Extension(user.clone())).await;
    let body = body_json(resp).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"take.mp3\"\r\nContent-Type: audio/mpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

async fn post_upload(
    state: &AppState,
    token: &str,
    fields: &[(&str, &str)],
    file: Option<&[u8]>,
) -> Response<Body> {
    let boundary = "xxboundaryxx";
    let req = Request::builder()
        .method("POST")
        .uri("/api/songs")
        .header("authorization", format!("Bearer {token}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart_body(boundary, fields, file)))
        .unwrap();

    app::api::router::route(state.clone())
        .oneshot(req)
        .await
        .unwrap()
}

#[tokio::test]
async fn upload_rejects_missing_fields_without_storing_anything() {
    let (state, store) = make_state().await;
    let (_, token) = register(&state, "edgeuser", "edge@example.com").await;

    // no title
    let resp = post_upload(
        &state,
        &token,
        &[("artist", "tester"), ("duration", "3:05")],
        Some(b"riff"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // whitespace-only title
    let resp = post_upload(
        &state,
        &token,
        &[("title", "   "), ("artist", "tester"), ("duration", "3:05")],
        Some(b"riff"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // no file
    let resp = post_upload(
        &state,
        &token,
        &[("title", "take"), ("artist", "tester"), ("duration", "3:05")],
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(store.stored.lock().unwrap().is_empty());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn upload_over_the_cap_is_413() {
    let (state, store) = make_state().await;
    let (_, token) = register(&state, "edgeuser", "edge@example.com").await;

    // cap in make_state is 1024 bytes
    let big = vec![0u8; 2048];
    let resp = post_upload(
        &state,
        &token,
        &[("title", "take"), ("artist", "tester"), ("duration", "3:05")],
        Some(&big),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(store.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn upload_happy_path_persists_and_returns_the_song() {
    let (state, store) = make_state().await;
    let (_, token) = register(&state, "edgeuser", "edge@example.com").await;

    let resp = post_upload(
        &state,
        &token,
        &[("title", "take"), ("artist", "tester"), ("duration", "3:05")],
        Some(b"riff"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body = body_json(resp).await;
    assert_eq!(body["title"], "take");
    assert!(body["filePath"].as_str().unwrap().starts_with("/media/"));
    assert_eq!(store.stored.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_persistence_releases_the_stored_asset() {
    let (state, store) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;

    // sabotage persistence after the user exists
    sqlx::query("DROP TABLE songs")
        .execute(&state.pool)
        .await
        .unwrap();

    let err = songs::create_song(&state, &user, "take", "tester", "3:05", "take.mp3", b"riff")
        .await
        .unwrap_err();
    assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);

    // the asset went in and came back out
    assert_eq!(store.deleted.lock().unwrap().len(), 1);
    assert!(store.stored.lock().unwrap().is_empty());
}

#[tokio::test]
async fn song_edit_is_scoped_and_freezes_duration() {
    let (state, _) = make_state().await;
    let (alice, _) = register(&state, "alice", "alice@example.com").await;
    let (bob, _) = register(&state, "bob", "bob@example.com").await;
    let song_id = add_owned_song(&state, &alice, "take").await;

    // owner edit works
    let resp = songs::update(
        State(state.clone()),
        Extension(alice.clone()),
        Path(song_id.clone()),
        Json(SongEdit {
            title: Some("renamed".to_string()),
            artist: None,
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "renamed");
    assert_eq!(body["duration"], "3:05");

    // someone else's song reads as absent
    let resp = songs::update(
        State(state.clone()),
        Extension(bob.clone()),
        Path(song_id.clone()),
        Json(SongEdit {
            title: Some("stolen".to_string()),
            artist: None,
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_song_releases_its_asset() {
    let (state, store) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;
    let song_id = add_owned_song(&state, &user, "take").await;

    let resp = songs::remove(
        State(state.clone()),
        Extension(user.clone()),
        Path(song_id),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.deleted.lock().unwrap().len(), 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn preloaded_songs_accept_edits_without_touching_shared_state() {
    let (state, store) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;

    let resp = songs::update(
        State(state.clone()),
        Extension(user.clone()),
        Path("preloaded-1".to_string()),
        Json(SongEdit {
            title: Some("my title".to_string()),
            artist: None,
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "my title");

    // catalog itself is untouched
    assert_eq!(app::catalog::lookup("preloaded-1").unwrap().title, "Welcome to Gerardify");

    let resp = songs::remove(
        State(state.clone()),
        Extension(user.clone()),
        Path("preloaded-1".to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(store.deleted.lock().unwrap().is_empty());
}

// ---- playlists ----

async fn new_playlist(state: &AppState, user: &CurrentUser, name: &str) -> i64 {
    let resp = playlists::create(
        State(state.clone()),
        Extension(user.clone()),
        Json(PlaylistCreate {
            name: name.to_string(),
            artist: user.username.clone(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn playlist_ids_allocate_sequentially() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;

    assert_eq!(new_playlist(&state, &user, "one").await, 1);
    assert_eq!(new_playlist(&state, &user, "two").await, 2);
}

#[tokio::test]
async fn playlist_id_must_be_numeric() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;

    let resp = playlists::get_one(
        State(state.clone()),
        Extension(user.clone()),
        Path("not-a-number".to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn playlists_are_owner_scoped() {
    let (state, _) = make_state().await;
    let (alice, _) = register(&state, "alice", "alice@example.com").await;
    let (bob, _) = register(&state, "bob", "bob@example.com").await;
    let id = new_playlist(&state, &alice, "hers").await;

    let resp = playlists::get_one(
        State(state.clone()),
        Extension(bob.clone()),
        Path(id.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_add_is_rejected_and_remove_is_idempotent() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;
    let id = new_playlist(&state, &user, "mix").await;
    let song_id = add_owned_song(&state, &user, "take").await;

    let resp = playlists::add_song(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(AddSongRequest {
            song_id: song_id.clone(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["songs"].as_array().unwrap().len(), 1);

    // second add of the same id is a caller error
    let resp = playlists::add_song(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(AddSongRequest {
            song_id: song_id.clone(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // removing an id that isn't there returns the playlist unchanged
    let resp = playlists::remove_song(
        State(state.clone()),
        Extension(user.clone()),
        Path((id.to_string(), "ghost".to_string())),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["songs"].as_array().unwrap().len(), 1);

    // removing the real one empties it
    let resp = playlists::remove_song(
        State(state.clone()),
        Extension(user.clone()),
        Path((id.to_string(), song_id)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["songs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn preloaded_tracks_can_join_playlists() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;
    let id = new_playlist(&state, &user, "mix").await;

    let resp = playlists::add_song(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(AddSongRequest {
            song_id: "preloaded-2".to_string(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["songs"][0]["songId"], "preloaded-2");
    assert_eq!(body["songs"][0]["title"], "Night Drive");

    // a song id that is neither owned nor preloaded is absent
    let resp = playlists::add_song(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(AddSongRequest {
            song_id: "preloaded-999".to_string(),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn snapshots_do_not_follow_later_song_edits() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;
    let id = new_playlist(&state, &user, "mix").await;
    let song_id = add_owned_song(&state, &user, "original title").await;

    playlists::add_song(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(AddSongRequest {
            song_id: song_id.clone(),
        }),
    )
    .await;

    songs::update(
        State(state.clone()),
        Extension(user.clone()),
        Path(song_id),
        Json(SongEdit {
            title: Some("new title".to_string()),
            artist: None,
        }),
    )
    .await;

    // the embedded copy stays as it was at add time
    let resp = playlists::get_one(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
    )
    .await;
    assert_eq!(body_json(resp).await["songs"][0]["title"], "original title");
}

#[tokio::test]
async fn playlist_rename_and_delete() {
    let (state, _) = make_state().await;
    let (user, _) = register(&state, "edgeuser", "edge@example.com").await;
    let id = new_playlist(&state, &user, "mix").await;

    let resp = playlists::update(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
        Json(PlaylistEdit {
            name: Some("renamed".to_string()),
            artist: None,
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["name"], "renamed");

    let resp = playlists::remove(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = playlists::get_one(
        State(state.clone()),
        Extension(user.clone()),
        Path(id.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ---- misc ----

#[tokio::test]
async fn health_reports_database_state() {
    let (state, _) = make_state().await;
    let resp = app::api::endpoints::health(State(state.clone())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn preloaded_catalog_is_served_without_auth() {
    let (state, _) = make_state().await;
    let req = Request::builder()
        .uri("/api/preloaded-songs")
        .body(Body::empty())
        .unwrap();

    let resp = app::api::router::route(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), app::catalog::CATALOG.len());
}

#[tokio::test]
async fn media_never_escapes_the_media_dir() {
    let (mut state, _) = make_state().await;

    let dir = std::env::temp_dir().join(format!("gerardify-media-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("take.mp3"), b"riff").await.unwrap();
    state.media_dir = dir;

    // a file inside the media dir streams back
    let req = Request::builder()
        .uri("/media/take.mp3")
        .body(Body::empty())
        .unwrap();
    let resp = app::api::router::route(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"riff");

    // a readable file anywhere else on disk must not, whether addressed by
    // an absolute path (join would discard the media dir) or by climbing out
    let outside = std::env::temp_dir().join("gerardify-secret.txt");
    tokio::fs::write(&outside, b"top secret").await.unwrap();
    let encoded = outside.to_str().unwrap().replace('/', "%2F");

    for uri in [
        format!("/media/{encoded}"),
        "/media/../gerardify-secret.txt".to_string(),
        "/media/..%2Fgerardify-secret.txt".to_string(),
    ] {
        let req = Request::builder().uri(&uri).body(Body::empty()).unwrap();
        let resp = app::api::router::route(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn gated_routes_reject_missing_credentials() {
    let (state, _) = make_state().await;
    let req = Request::builder()
        .uri("/api/songs")
        .body(Body::empty())
        .unwrap();

    let resp = app::api::router::route(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
