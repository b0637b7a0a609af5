pub mod api;
pub mod arbiter;
pub mod config;
pub mod db;
pub mod error;
pub mod leaderboard;
pub mod metrics;
pub mod scheduler;
pub mod sweep;
pub mod sync;
