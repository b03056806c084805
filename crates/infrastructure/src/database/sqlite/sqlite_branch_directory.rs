use async_trait::async_trait;
use routing_core::{
    models::Branch,
    traits::{BranchAdmin, BranchDirectory},
    RoutingError, RoutingResult,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

/// 基于 `branches` 表的门店目录
pub struct SqliteBranchDirectory {
    pool: SqlitePool,
}

impl SqliteBranchDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_branch(row: &SqliteRow) -> Result<Branch, sqlx::Error> {
        Ok(Branch {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            is_active: row.try_get("is_active")?,
            is_closed: row.try_get("is_closed")?,
        })
    }
}

#[async_trait]
impl BranchDirectory for SqliteBranchDirectory {
    #[instrument(skip(self))]
    async fn list_active_branches(&self) -> RoutingResult<Vec<Branch>> {
        let rows = sqlx::query(
            "SELECT id, name, latitude, longitude, is_active, is_closed FROM branches WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RoutingError::directory_unavailable(e.to_string()))?;

        rows.iter()
            .map(Self::row_to_branch)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RoutingError::directory_unavailable(e.to_string()))
    }
}

#[async_trait]
impl BranchAdmin for SqliteBranchDirectory {
    #[instrument(skip(self, branch), fields(branch_id = %branch.id))]
    async fn upsert_branch(&self, branch: &Branch) -> RoutingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO branches (id, name, latitude, longitude, is_active, is_closed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                is_active = excluded.is_active,
                is_closed = excluded.is_closed
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(branch.latitude)
        .bind(branch.longitude)
        .bind(branch.is_active)
        .bind(branch.is_closed)
        .execute(&self.pool)
        .await?;

        debug!("门店 {} 已写入", branch.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_closed(&self, branch_id: &str, is_closed: bool) -> RoutingResult<()> {
        let result = sqlx::query("UPDATE branches SET is_closed = ?1 WHERE id = ?2")
            .bind(is_closed)
            .bind(branch_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RoutingError::branch_not_found(branch_id));
        }
        Ok(())
    }
}
