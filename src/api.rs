// http layer
pub mod cors;
pub mod endpoints;
pub mod login;
pub mod playlists;
pub mod router;
pub mod songs;
