pub mod audio_models;
pub mod background;
pub mod config;
pub mod episode;
pub mod error;
pub mod state;
pub mod timeline;
pub mod timing;
