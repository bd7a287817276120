pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod playlist;
pub mod render;
pub mod source;
pub mod web;
pub mod tasks {
    pub mod cache;
    pub mod engine;
}
