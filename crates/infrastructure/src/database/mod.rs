//! SQLite 存储：连接池、表结构与仓储实现

pub mod sqlite;

pub use sqlite::{SqliteBranchDirectory, SqliteOrderRepository};

use std::str::FromStr;
use std::time::Duration;

use routing_core::config::DatabaseConfig;
use routing_core::RoutingResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// 按配置创建连接池
///
/// 内存数据库每个连接各自独立，因此固定为单连接且不回收。
pub async fn create_sqlite_pool(config: &DatabaseConfig) -> RoutingResult<SqlitePool> {
    let in_memory = config.url.contains(":memory:");
    let mut connect_options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect_with(connect_options)
        .await?;

    info!("SQLite连接池已创建: {}", config.url);
    Ok(pool)
}

/// 创建订单表和门店表
pub async fn init_schema(pool: &SqlitePool) -> RoutingResult<()> {
    debug!("Running SQLite schema bootstrap");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS branches (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_closed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            mode TEXT NOT NULL,
            customer_lat REAL,
            customer_lng REAL,
            status TEXT NOT NULL,
            branch_id TEXT,
            branch_id_original TEXT,
            is_reassigned INTEGER NOT NULL DEFAULT 0,
            is_long_distance INTEGER NOT NULL DEFAULT 0,
            radius_used_km REAL NOT NULL DEFAULT 0,
            routing_attempts INTEGER NOT NULL DEFAULT 0,
            routing_log TEXT NOT NULL DEFAULT '[]',
            version INTEGER NOT NULL DEFAULT 0,
            last_routing_request_id TEXT,
            applied_request_ids TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
        "CREATE INDEX IF NOT EXISTS idx_orders_branch_id ON orders(branch_id)",
        "CREATE INDEX IF NOT EXISTS idx_branches_is_active ON branches(is_active)",
    ];
    for index in indexes {
        sqlx::query(index).execute(pool).await?;
    }

    info!("SQLite表结构初始化完成");
    Ok(())
}
