//! Court lookups backing booking validation.

use super::models::{Court, CourtId};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use thiserror::Error;

/// Court errors
#[derive(Debug, Error)]
pub enum CourtError {
    #[error("Court not found: {0}")]
    NotFound(CourtId),

    #[error("Court is inactive: {0}")]
    Inactive(CourtId),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type CourtResult<T> = Result<T, CourtError>;

/// Court manager
#[derive(Clone)]
pub struct CourtManager {
    pool: Arc<PgPool>,
}

impl CourtManager {
    /// Create a new court manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a court by id.
    pub async fn get_court(&self, court_id: CourtId) -> CourtResult<Court> {
        let row = sqlx::query(
            "SELECT id, name, base_price_per_hour, is_active, created_at
             FROM courts WHERE id = $1",
        )
        .bind(court_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(CourtError::NotFound(court_id))?;

        Ok(court_from_row(&row))
    }

    /// List all courts currently open for reservations.
    pub async fn list_active(&self) -> CourtResult<Vec<Court>> {
        let rows = sqlx::query(
            "SELECT id, name, base_price_per_hour, is_active, created_at
             FROM courts WHERE is_active ORDER BY id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.iter().map(court_from_row).collect())
    }
}

fn court_from_row(row: &sqlx::postgres::PgRow) -> Court {
    Court {
        id: row.get("id"),
        name: row.get("name"),
        base_price_per_hour: row.get("base_price_per_hour"),
        is_active: row.get("is_active"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}
