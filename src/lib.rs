pub mod config;
pub mod engine;
pub mod http;
pub mod intake;
pub mod limits;
pub mod model;
pub mod observability;
pub mod reaper;
pub mod wal;
