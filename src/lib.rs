pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod filter;
pub mod forms;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod resource;
pub mod routes;
pub mod security;
pub mod serializer;
pub mod tracing_config;
pub mod utils;

use std::sync::Arc;

use config::Config;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: db::DBClient,
}

pub use routes::create_router;
