pub mod auth;
pub mod browse;
pub mod clear;
pub mod collections;
pub mod config;
pub mod daemon;
pub mod prompts;
pub mod reviews;
pub mod sync;
pub mod sync_ui;
