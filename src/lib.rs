pub mod animation;
pub mod cache;
pub mod canvas;
pub mod config;
pub mod error;
pub mod loader;
pub mod player;
pub mod scene;
pub mod scheduler;
pub mod scroll;
pub mod sequence;
pub mod source;
pub mod viewer;
