//! Math-rule persistence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use vigil_core::{group_ids_csv, MathRule};
use vigil_rules::backend::{BackendError, MathRuleSource};

use super::{join_csv, parse_id_csv, RepoError};

const COLUMNS: &str = "id, name, calculate_type, express, metric_list, threshold, unit, \
    time_window, duration, origin, business_type, category, extension_condition, level, \
    creator, updater, responsible_people, crontab, switch, inuse, group_ids, web_hooks, \
    description, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct MathRuleRow {
    id: i64,
    name: String,
    calculate_type: i16,
    express: String,
    metric_list: String,
    threshold: f64,
    unit: String,
    time_window: String,
    duration: i32,
    origin: String,
    business_type: String,
    category: i16,
    extension_condition: String,
    level: i16,
    creator: String,
    updater: String,
    responsible_people: String,
    crontab: String,
    switch: i16,
    inuse: i16,
    group_ids: String,
    web_hooks: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MathRuleRow> for MathRule {
    type Error = RepoError;

    fn try_from(row: MathRuleRow) -> Result<Self, RepoError> {
        let id = row.id;
        let corrupt = move |message: String| RepoError::Corrupt { id, message };
        let metrics: HashMap<String, String> =
            serde_json::from_str(&row.metric_list).map_err(|e| corrupt(e.to_string()))?;
        let windows: HashMap<String, Vec<String>> =
            serde_json::from_str(&row.time_window).map_err(|e| corrupt(e.to_string()))?;

        Ok(MathRule {
            id: row.id,
            name: row.name,
            calculate_type: row.calculate_type.try_into().map_err(corrupt)?,
            express: row.express,
            metrics,
            threshold: row.threshold,
            unit: row.unit,
            windows,
            duration: row.duration,
            origin: row.origin,
            business_type: row.business_type,
            category: row.category,
            extension_condition: row.extension_condition,
            level: row.level.try_into().map_err(corrupt)?,
            creator: row.creator,
            updater: row.updater,
            responsible_people: row.responsible_people,
            crontab: row.crontab,
            switch: row.switch.try_into().map_err(corrupt)?,
            inuse: row.inuse.try_into().map_err(corrupt)?,
            group_ids: parse_id_csv(&row.group_ids),
            webhooks: row
                .web_hooks
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            description: row.description,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

/// Paged condition filter for the query endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MathRuleQuery {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub creator: Option<String>,
    pub responsible_people: Option<String>,
    pub origin: Option<String>,
    #[serde(rename = "type")]
    pub business_type: Option<String>,
    pub category: Option<i16>,
    pub switch: Option<i16>,
    pub inuse: Option<i16>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_size() -> i64 {
    20
}

impl MathRuleQuery {
    fn normalized(&self) -> (i64, i64) {
        (self.page.max(1), self.size.clamp(1, 500))
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, q: &'a MathRuleQuery) {
    qb.push(" WHERE deleted_at IS NULL");
    if let Some(id) = q.id {
        qb.push(" AND id = ").push_bind(id);
    }
    if let Some(name) = &q.name {
        qb.push(" AND name LIKE ").push_bind(format!("%{name}%"));
    }
    if let Some(creator) = &q.creator {
        qb.push(" AND creator = ").push_bind(creator);
    }
    if let Some(people) = &q.responsible_people {
        qb.push(" AND responsible_people = ").push_bind(people);
    }
    if let Some(origin) = &q.origin {
        qb.push(" AND origin = ").push_bind(origin);
    }
    if let Some(business_type) = &q.business_type {
        qb.push(" AND business_type = ").push_bind(business_type);
    }
    if let Some(category) = q.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(switch) = q.switch {
        qb.push(" AND switch = ").push_bind(switch);
    }
    if let Some(inuse) = q.inuse {
        qb.push(" AND inuse = ").push_bind(inuse);
    }
}

#[derive(Clone)]
pub struct MathRepo {
    pool: PgPool,
}

impl MathRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn select_by_condition(
        &self,
        q: &MathRuleQuery,
    ) -> Result<(Vec<MathRule>, i64), RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM math_rules");
        push_filters(&mut count_qb, q);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let (page, size) = q.normalized();
        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM math_rules"));
        push_filters(&mut qb, q);
        qb.push(" ORDER BY updated_at DESC LIMIT ")
            .push_bind(size)
            .push(" OFFSET ")
            .push_bind((page - 1) * size);
        let rows: Vec<MathRuleRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let rules = rows
            .into_iter()
            .map(MathRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rules, total))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<MathRule>, RepoError> {
        let row: Option<MathRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM math_rules WHERE name = $1 AND deleted_at IS NULL LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MathRule::try_from).transpose()
    }

    pub async fn select_by_id(&self, id: i64) -> Result<MathRule, RepoError> {
        let row: Option<MathRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM math_rules WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MathRule::try_from)
            .transpose()?
            .ok_or(RepoError::NotFound(id))
    }

    pub async fn select_by_ids(&self, ids: &[i64]) -> Result<Vec<MathRule>, RepoError> {
        let rows: Vec<MathRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM math_rules WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY created_at DESC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MathRule::try_from).collect()
    }

    pub async fn insert(&self, rule: &MathRule) -> Result<i64, RepoError> {
        let metric_list = encode_json(rule.id, &rule.metrics)?;
        let time_window = encode_json(rule.id, &rule.windows)?;

        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO math_rules (name, calculate_type, express, metric_list, threshold, \
             unit, time_window, duration, origin, business_type, category, \
             extension_condition, level, creator, updater, responsible_people, crontab, \
             switch, inuse, group_ids, web_hooks, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22) RETURNING id",
        )
        .bind(&rule.name)
        .bind(i16::from(rule.calculate_type))
        .bind(&rule.express)
        .bind(&metric_list)
        .bind(rule.threshold)
        .bind(&rule.unit)
        .bind(&time_window)
        .bind(rule.duration)
        .bind(&rule.origin)
        .bind(&rule.business_type)
        .bind(rule.category)
        .bind(&rule.extension_condition)
        .bind(i16::from(rule.level))
        .bind(&rule.creator)
        .bind(&rule.updater)
        .bind(&rule.responsible_people)
        .bind(&rule.crontab)
        .bind(i16::from(rule.switch))
        .bind(i16::from(rule.inuse))
        .bind(group_ids_csv(&rule.group_ids))
        .bind(join_csv(rule.webhooks.clone()))
        .bind(&rule.description)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Full-row update by id, including zero-valued fields.
    pub async fn save(&self, rule: &MathRule) -> Result<(), RepoError> {
        let metric_list = encode_json(rule.id, &rule.metrics)?;
        let time_window = encode_json(rule.id, &rule.windows)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE math_rules SET name = $1, calculate_type = $2, express = $3, \
             metric_list = $4, threshold = $5, unit = $6, time_window = $7, duration = $8, \
             origin = $9, business_type = $10, category = $11, extension_condition = $12, \
             level = $13, creator = $14, updater = $15, responsible_people = $16, \
             crontab = $17, switch = $18, inuse = $19, group_ids = $20, web_hooks = $21, \
             description = $22, updated_at = now() WHERE id = $23 AND deleted_at IS NULL",
        )
        .bind(&rule.name)
        .bind(i16::from(rule.calculate_type))
        .bind(&rule.express)
        .bind(&metric_list)
        .bind(rule.threshold)
        .bind(&rule.unit)
        .bind(&time_window)
        .bind(rule.duration)
        .bind(&rule.origin)
        .bind(&rule.business_type)
        .bind(rule.category)
        .bind(&rule.extension_condition)
        .bind(i16::from(rule.level))
        .bind(&rule.creator)
        .bind(&rule.updater)
        .bind(&rule.responsible_people)
        .bind(&rule.crontab)
        .bind(i16::from(rule.switch))
        .bind(i16::from(rule.inuse))
        .bind(group_ids_csv(&rule.group_ids))
        .bind(join_csv(rule.webhooks.clone()))
        .bind(&rule.description)
        .bind(rule.id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(rule.id));
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn update_switch(
        &self,
        id: i64,
        switch: i16,
        updater: &str,
    ) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE math_rules SET switch = $1, updater = $2, updated_at = now() \
             WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(switch)
        .bind(updater)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Soft delete: mark the rows out of use and stamp `deleted_at`.
    pub async fn soft_delete(&self, updater: &str, ids: &[i64]) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE math_rules SET inuse = 2, updater = $1, deleted_at = now(), \
             updated_at = now() WHERE id = ANY($2) AND deleted_at IS NULL",
        )
        .bind(updater)
        .bind(ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MathRuleSource for MathRepo {
    async fn load_active(&self) -> Result<Vec<MathRule>, BackendError> {
        let rows: Vec<MathRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM math_rules \
             WHERE switch = 1 AND inuse = 1 AND deleted_at IS NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::from)?;
        rows.into_iter()
            .map(|row| MathRule::try_from(row).map_err(BackendError::from))
            .collect()
    }
}

fn encode_json<T: serde::Serialize>(id: i64, value: &T) -> Result<String, RepoError> {
    serde_json::to_string(value).map_err(|e| RepoError::Corrupt {
        id,
        message: e.to_string(),
    })
}
