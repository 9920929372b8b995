use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::client::CurriculumHttpClient;
use crate::error::AppError;
use crate::models::Catalog;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://curriculum.db";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub api_base_url: String,
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn new_from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| AppError::BadRequest(format!("BIND_ADDR {:?} is invalid: {}", bind_raw, e)))?;
        let api_base_url =
            lookup("CURRICULUM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let catalog_path = lookup("CATALOG_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            bind_addr,
            api_base_url,
            catalog_path,
        })
    }

    pub fn load_catalog(&self) -> Result<Catalog, AppError> {
        match &self.catalog_path {
            Some(path) => Catalog::from_json_file(path),
            None => Ok(Catalog::default()),
        }
    }

    /// HTTP client for the curriculum API at `CURRICULUM_API_URL`.
    pub fn curriculum_client(&self) -> Result<CurriculumHttpClient, AppError> {
        CurriculumHttpClient::new(self.api_base_url.clone())
    }
}
