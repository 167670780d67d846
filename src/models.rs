use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,

    // never goes over the wire
    #[serde(skip_serializing)]
    pub password: String,

    pub created_at: String,
}

#[derive(Serialize, FromRow, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,

    // song info
    pub title: String,
    pub artist: String,
    pub duration: String,

    // where the audio actually lives
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    pub user_id: String,
    pub created_at: String,
}

#[derive(Serialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: i64,

    // playlist info
    pub name: String,
    pub artist: String,
    pub year: i64,

    pub user_id: String,
    pub created_at: String,

    // embedded snapshots, loaded separately
    #[sqlx(skip)]
    pub songs: Vec<PlaylistEntry>,
}

// denormalized copy of a song taken at add time. deliberately never resynced,
// so it can drift from the live row if the song is edited later
#[derive(Serialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistEntry {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub duration: String,
    pub file_path: String,
    pub position: i64,
}

// ---- request bodies ----

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SongEdit {
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Deserialize)]
pub struct PlaylistCreate {
    pub name: String,
    pub artist: String,
}

#[derive(Deserialize)]
pub struct PlaylistEdit {
    pub name: Option<String>,
    pub artist: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSongRequest {
    pub song_id: String,
}

// ---- auth plumbing ----

#[derive(Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// what require_auth stashes in request extensions
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}
