pub mod affiliates;
pub mod checkpoint;
pub mod clean;
pub mod fetch;
pub mod http_client;
pub mod leaderboard;
pub mod persist;
pub mod schema;
