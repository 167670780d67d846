// export for external use
pub mod api;
pub mod assets;
pub mod catalog;
pub mod db;
pub mod models;
pub mod player;
