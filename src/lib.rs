// Library root — exposes the marketplace core for the binary and for
// integration tests. The binary entry point is src/main.rs.

pub mod classify;
pub mod config;
pub mod error;
pub mod http;
pub mod listings;
pub mod llm;
pub mod logger;
pub mod taxonomy;
