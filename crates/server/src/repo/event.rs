//! Alert-event persistence and the stale-rule scan.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vigil_core::AlertEvent;
use vigil_notify::{EventStore, NotifyError};
use vigil_rules::backend::{BackendError, StaleRuleStore};

#[derive(Clone)]
pub struct EventRepo {
    pool: PgPool,
}

impl EventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EventStore for EventRepo {
    async fn insert(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| NotifyError::Store(e.to_string()))?;
        sqlx::query(
            "INSERT INTO alert_events (alert_id, name, item, origin, business_type, \
             category, value, level, content, rule_name, group_id, owner, status, platform, \
             platform_name, alert_time, creator, updater, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19)",
        )
        .bind(&event.alert_id)
        .bind(&event.name)
        .bind(&event.item)
        .bind(&event.origin)
        .bind(&event.business_type)
        .bind(event.category)
        .bind(event.value)
        .bind(i16::from(event.level))
        .bind(&event.content)
        .bind(&event.rule_name)
        .bind(&event.group_id)
        .bind(&event.owner)
        .bind(i16::from(event.status))
        .bind(event.platform)
        .bind(&event.platform_name)
        .bind(event.alert_time)
        .bind(&event.creator)
        .bind(&event.updater)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| NotifyError::Store(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| NotifyError::Store(e.to_string()))?;
        Ok(())
    }
}

/// Names of live-but-disabled rules across both families, for the
/// staleness reminder.
#[derive(Clone)]
pub struct StaleRepo {
    pool: PgPool,
}

impl StaleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StaleRuleStore for StaleRepo {
    async fn stale_rule_names(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM math_rules \
             WHERE inuse = 1 AND switch = 2 AND deleted_at IS NULL AND updated_at <= $1 \
             UNION ALL \
             SELECT name FROM log_rules \
             WHERE inuse = 1 AND switch = 2 AND deleted_at IS NULL AND updated_at <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BackendError::Store(e.to_string()))?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }
}
