use sea_orm::{Database, DatabaseConnection};

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub async fn connect(config: &Config) -> AppResult<DatabaseConnection> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Internal("DATABASE_URL is not set".to_string()))?;

    Database::connect(url)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to connect to database: {}", e)))
}
