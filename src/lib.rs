pub mod app;
pub mod auth;
pub mod bonus;
pub mod compression;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod meals;
pub mod state;
pub mod storage;
