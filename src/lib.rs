pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod store;
pub mod utils;
pub mod validation;
