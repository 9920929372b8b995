use std::sync::Arc;

use sqlx::SqlitePool;

use crate::client::CurriculumClient;
use crate::models::Catalog;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub curriculum: Arc<dyn CurriculumClient>,
    pub catalog: Arc<Catalog>,
}
