pub mod config;
pub mod log;
pub mod models;
pub mod routes;
pub mod server;
