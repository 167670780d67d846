use serde::Serialize;

use crate::models::Song;

// ids in this namespace never touch the database
pub const PRELOADED_PREFIX: &str = "preloaded-";

// sample track baked into the build. read-only: edits and deletes against
// these ids are accepted but never mutate anything shared
#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PreloadedSong {
    pub id: &'static str,
    pub title: &'static str,
    pub artist: &'static str,
    pub duration: &'static str,
    pub file_path: &'static str,
}

pub static CATALOG: &[PreloadedSong] = &[
    PreloadedSong {
        id: "preloaded-1",
        title: "Welcome to Gerardify",
        artist: "Gerardify",
        duration: "2:41",
        file_path: "/media/preloaded/welcome.mp3",
    },
    PreloadedSong {
        id: "preloaded-2",
        title: "Night Drive",
        artist: "The Samples",
        duration: "3:15",
        file_path: "/media/preloaded/night-drive.mp3",
    },
    PreloadedSong {
        id: "preloaded-3",
        title: "Morning Coffee",
        artist: "The Samples",
        duration: "2:58",
        file_path: "/media/preloaded/morning-coffee.mp3",
    },
    PreloadedSong {
        id: "preloaded-4",
        title: "Static Bloom",
        artist: "Wire Garden",
        duration: "4:02",
        file_path: "/media/preloaded/static-bloom.mp3",
    },
];

pub fn lookup(id: &str) -> Option<&'static PreloadedSong> {
    if !id.starts_with(PRELOADED_PREFIX) {
        return None;
    }
    CATALOG.iter().find(|s| s.id == id)
}

// a song reference once it has been resolved at the boundary. playlist
// membership takes its snapshot from here so handlers never have to care
// which side it came from
pub enum Track {
    Owned(Song),
    Preloaded(&'static PreloadedSong),
}

impl Track {
    pub fn id(&self) -> &str {
        match self {
            Track::Owned(s) => &s.id,
            Track::Preloaded(p) => p.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Track::Owned(s) => &s.title,
            Track::Preloaded(p) => p.title,
        }
    }

    pub fn artist(&self) -> &str {
        match self {
            Track::Owned(s) => &s.artist,
            Track::Preloaded(p) => p.artist,
        }
    }

    pub fn duration(&self) -> &str {
        match self {
            Track::Owned(s) => &s.duration,
            Track::Preloaded(p) => p.duration,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Track::Owned(s) => &s.file_path,
            Track::Preloaded(p) => p.file_path,
        }
    }
}
