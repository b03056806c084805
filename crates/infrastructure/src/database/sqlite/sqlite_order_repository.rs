use async_trait::async_trait;
use chrono::{DateTime, Utc};
use routing_core::{
    geo::GeoPoint,
    models::{Order, OrderMode, OrderStatus, RoutingStep, RoutingUpdate},
    traits::OrderRepository,
    RoutingError, RoutingResult,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &SqliteRow) -> RoutingResult<Order> {
        let mode: String = row.try_get("mode")?;
        let status: String = row.try_get("status")?;
        let routing_log: String = row.try_get("routing_log")?;
        let routing_log: Vec<RoutingStep> = serde_json::from_str(&routing_log)?;
        let applied_request_ids: String = row.try_get("applied_request_ids")?;
        let applied_request_ids: Vec<String> = serde_json::from_str(&applied_request_ids)?;

        let customer_lat: Option<f64> = row.try_get("customer_lat")?;
        let customer_lng: Option<f64> = row.try_get("customer_lng")?;
        let customer_location = match (customer_lat, customer_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };

        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Order {
            id: row.try_get("id")?,
            mode: mode.parse::<OrderMode>()?,
            customer_location,
            status: status.parse::<OrderStatus>()?,
            branch_id: row.try_get("branch_id")?,
            branch_id_original: row.try_get("branch_id_original")?,
            is_reassigned: row.try_get("is_reassigned")?,
            is_long_distance: row.try_get("is_long_distance")?,
            radius_used_km: row.try_get("radius_used_km")?,
            routing_attempts: row.try_get("routing_attempts")?,
            routing_log,
            version: row.try_get("version")?,
            last_routing_request_id: row.try_get("last_routing_request_id")?,
            applied_request_ids,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    #[instrument(skip(self, order), fields(order_id = %order.id, mode = %order.mode))]
    async fn create(&self, order: &Order) -> RoutingResult<Order> {
        let routing_log = serde_json::to_string(&order.routing_log)?;
        let applied_request_ids = serde_json::to_string(&order.applied_request_ids)?;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (
                id, mode, customer_lat, customer_lng, status, branch_id, branch_id_original,
                is_reassigned, is_long_distance, radius_used_km, routing_attempts, routing_log,
                version, last_routing_request_id, applied_request_ids, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            RETURNING *
            "#,
        )
        .bind(&order.id)
        .bind(order.mode.as_str())
        .bind(order.customer_location.map(|p| p.latitude))
        .bind(order.customer_location.map(|p| p.longitude))
        .bind(order.status.as_str())
        .bind(&order.branch_id)
        .bind(&order.branch_id_original)
        .bind(order.is_reassigned)
        .bind(order.is_long_distance)
        .bind(order.radius_used_km)
        .bind(order.routing_attempts)
        .bind(routing_log)
        .bind(order.version)
        .bind(&order.last_routing_request_id)
        .bind(applied_request_ids)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RoutingError::invalid_request(format!("订单已存在: {}", order.id))
            }
            other => RoutingError::from(other),
        })?;

        debug!("订单 {} 已创建", order.id);
        Self::row_to_order(&row)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> RoutingResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    #[instrument(skip(self, update), fields(status = %update.status, request_id = %update.request_id))]
    async fn apply_routing_update(
        &self,
        order_id: &str,
        expected_version: i64,
        update: &RoutingUpdate,
    ) -> RoutingResult<Order> {
        let routing_log = serde_json::to_string(&update.routing_log)?;

        let row = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?1,
                branch_id = COALESCE(?2, branch_id),
                branch_id_original = COALESCE(branch_id_original, ?3),
                radius_used_km = COALESCE(?4, radius_used_km),
                is_long_distance = COALESCE(?5, is_long_distance),
                is_reassigned = (is_reassigned OR ?6),
                routing_attempts = routing_attempts + ?7,
                routing_log = ?8,
                last_routing_request_id = ?9,
                applied_request_ids = CASE
                    WHEN EXISTS (SELECT 1 FROM json_each(applied_request_ids) WHERE value = ?9)
                        THEN applied_request_ids
                    ELSE json_insert(applied_request_ids, '$[#]', ?9)
                END,
                version = version + 1,
                updated_at = ?10
            WHERE id = ?11 AND version = ?12
            RETURNING *
            "#,
        )
        .bind(update.status.as_str())
        .bind(&update.branch_id)
        .bind(&update.branch_id_original)
        .bind(update.radius_used_km)
        .bind(update.is_long_distance)
        .bind(update.mark_reassigned)
        .bind(i32::from(update.increment_attempts))
        .bind(routing_log)
        .bind(&update.request_id)
        .bind(Utc::now())
        .bind(order_id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_order(&row);
        }

        let exists = sqlx::query("SELECT 1 FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if exists {
            debug!("订单 {} 版本 {} 已过期", order_id, expected_version);
            Err(RoutingError::concurrent_modification(
                order_id,
                expected_version,
            ))
        } else {
            Err(RoutingError::order_not_found(order_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_sqlite_pool, init_schema};
    use routing_core::config::DatabaseConfig;

    async fn repository() -> SqliteOrderRepository {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        let pool = create_sqlite_pool(&config).await.unwrap();
        init_schema(&pool).await.unwrap();
        SqliteOrderRepository::new(pool)
    }

    fn assigned(branch: &str, request_id: &str, log: Vec<RoutingStep>) -> RoutingUpdate {
        RoutingUpdate {
            status: OrderStatus::Pending,
            branch_id: Some(branch.to_string()),
            branch_id_original: Some(branch.to_string()),
            radius_used_km: Some(20.0),
            is_long_distance: Some(false),
            mark_reassigned: false,
            increment_attempts: true,
            routing_log: log,
            request_id: request_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = repository().await;
        let order = Order::new_delivery("o-1", GeoPoint::new(25.2, 55.27));
        repo.create(&order).await.unwrap();

        let found = repo.find_by_id("o-1").await.unwrap().unwrap();
        assert_eq!(found.mode, OrderMode::Delivery);
        assert_eq!(found.status, OrderStatus::Routing);
        assert_eq!(found.customer_location, Some(GeoPoint::new(25.2, 55.27)));
        assert_eq!(found.version, 0);
        assert!(found.routing_log.is_empty());

        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let repo = repository().await;
        let order = Order::new_delivery("o-dup", GeoPoint::new(0.0, 0.0));
        repo.create(&order).await.unwrap();

        let err = repo.create(&order).await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_conditional_update_and_version_conflict() {
        let repo = repository().await;
        repo.create(&Order::new_delivery("o-2", GeoPoint::new(25.2, 55.27)))
            .await
            .unwrap();

        let log = vec![
            RoutingStep::FindBranches { radius: 20.0 },
            RoutingStep::BranchAssigned {
                branch_id: "B1".to_string(),
            },
        ];
        let updated = repo
            .apply_routing_update("o-2", 0, &assigned("B1", "req-1", log.clone()))
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.status, OrderStatus::Pending);
        assert_eq!(updated.routing_attempts, 1);
        assert_eq!(updated.routing_log, log);
        assert_eq!(updated.last_routing_request_id.as_deref(), Some("req-1"));
        assert_eq!(updated.applied_request_ids, vec!["req-1".to_string()]);

        let again = repo
            .apply_routing_update("o-2", 1, &assigned("B1", "req-2", log.clone()))
            .await
            .unwrap();
        assert_eq!(again.applied_request_ids, vec!["req-1".to_string(), "req-2".to_string()]);
        assert!(again.has_applied("req-1"));

        let reloaded = repo.find_by_id("o-2").await.unwrap().unwrap();
        assert!(reloaded.has_applied("req-1"));
        assert!(reloaded.has_applied("req-2"));

        let stale = repo
            .apply_routing_update("o-2", 0, &assigned("B2", "req-2", log))
            .await
            .unwrap_err();
        assert!(matches!(
            stale,
            RoutingError::ConcurrentModification {
                expected_version: 0,
                ..
            }
        ));

        let missing = repo
            .apply_routing_update("ghost", 0, &assigned("B1", "req-3", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(missing, RoutingError::OrderNotFound { .. }));
    }

    #[tokio::test]
    async fn test_original_branch_and_reassigned_flag_are_sticky() {
        let repo = repository().await;
        repo.create(&Order::new_delivery("o-3", GeoPoint::new(25.2, 55.27)))
            .await
            .unwrap();

        let mut first = assigned("B1", "req-1", vec![]);
        first.mark_reassigned = true;
        repo.apply_routing_update("o-3", 0, &first).await.unwrap();

        let second = assigned("B2", "req-2", vec![]);
        let order = repo.apply_routing_update("o-3", 1, &second).await.unwrap();

        assert_eq!(order.branch_id.as_deref(), Some("B2"));
        assert_eq!(order.branch_id_original.as_deref(), Some("B1"));
        assert!(order.is_reassigned);
        assert_eq!(order.routing_attempts, 2);
    }

    #[tokio::test]
    async fn test_scheduled_update_leaves_unset_fields() {
        let repo = repository().await;
        repo.create(&Order::new_delivery("o-4", GeoPoint::new(25.2, 55.27)))
            .await
            .unwrap();

        let update = RoutingUpdate {
            status: OrderStatus::Scheduled,
            branch_id: Some("B9".to_string()),
            branch_id_original: None,
            radius_used_km: Some(35.0),
            is_long_distance: None,
            mark_reassigned: false,
            increment_attempts: true,
            routing_log: vec![],
            request_id: "req-1".to_string(),
        };
        let order = repo.apply_routing_update("o-4", 0, &update).await.unwrap();

        assert_eq!(order.status, OrderStatus::Scheduled);
        assert_eq!(order.branch_id.as_deref(), Some("B9"));
        assert!(order.branch_id_original.is_none());
        assert!(!order.is_long_distance);
        assert_eq!(order.radius_used_km, 35.0);
    }
}
