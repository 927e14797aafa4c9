//! Log-rule persistence.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use vigil_core::{group_ids_csv, LogRule};
use vigil_rules::backend::{BackendError, LogRuleSource};

use super::{parse_id_csv, RepoError};

const COLUMNS: &str = "id, name, source, address, username, password, es_index, \
    message_field, query_body, threshold, origin, business_type, category, level, creator, \
    updater, responsible_people, crontab, switch, inuse, group_ids, description, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct LogRuleRow {
    id: i64,
    name: String,
    source: String,
    address: String,
    username: String,
    password: String,
    es_index: String,
    message_field: String,
    query_body: String,
    threshold: f64,
    origin: String,
    business_type: String,
    category: i16,
    level: i16,
    creator: String,
    updater: String,
    responsible_people: String,
    crontab: String,
    switch: i16,
    inuse: i16,
    group_ids: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LogRuleRow> for LogRule {
    type Error = RepoError;

    fn try_from(row: LogRuleRow) -> Result<Self, RepoError> {
        let id = row.id;
        let corrupt = move |message: String| RepoError::Corrupt { id, message };
        Ok(LogRule {
            id: row.id,
            name: row.name,
            source: row.source,
            address: row.address,
            username: row.username,
            password: row.password,
            index: row.es_index,
            message_field: row.message_field,
            query_body: row.query_body,
            threshold: row.threshold,
            origin: row.origin,
            business_type: row.business_type,
            category: row.category,
            level: row.level.try_into().map_err(corrupt)?,
            creator: row.creator,
            updater: row.updater,
            responsible_people: row.responsible_people,
            crontab: row.crontab,
            switch: row.switch.try_into().map_err(corrupt)?,
            inuse: row.inuse.try_into().map_err(corrupt)?,
            group_ids: parse_id_csv(&row.group_ids),
            description: row.description,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

/// Paged condition filter for the query endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogRuleQuery {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub creator: Option<String>,
    pub responsible_people: Option<String>,
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

impl LogRuleQuery {
    fn normalized(&self) -> (i64, i64) {
        (self.page.max(1), self.size.clamp(1, 500))
    }
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, q: &'a LogRuleQuery) {
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
    if let Some(switch) = q.switch {
        qb.push(" AND switch = ").push_bind(switch);
    }
    if let Some(inuse) = q.inuse {
        qb.push(" AND inuse = ").push_bind(inuse);
    }
}

#[derive(Clone)]
pub struct LogRepo {
    pool: PgPool,
}

impl LogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn select_by_condition(
        &self,
        q: &LogRuleQuery,
    ) -> Result<(Vec<LogRule>, i64), RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM log_rules");
        push_filters(&mut count_qb, q);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let (page, size) = q.normalized();
        let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM log_rules"));
        push_filters(&mut qb, q);
        qb.push(" ORDER BY updated_at DESC LIMIT ")
            .push_bind(size)
            .push(" OFFSET ")
            .push_bind((page - 1) * size);
        let rows: Vec<LogRuleRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let rules = rows
            .into_iter()
            .map(LogRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rules, total))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<LogRule>, RepoError> {
        let row: Option<LogRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM log_rules WHERE name = $1 AND deleted_at IS NULL LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(LogRule::try_from).transpose()
    }

    pub async fn select_by_id(&self, id: i64) -> Result<LogRule, RepoError> {
        let row: Option<LogRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM log_rules WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(LogRule::try_from)
            .transpose()?
            .ok_or(RepoError::NotFound(id))
    }

    pub async fn select_by_ids(&self, ids: &[i64]) -> Result<Vec<LogRule>, RepoError> {
        let rows: Vec<LogRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM log_rules WHERE id = ANY($1) AND deleted_at IS NULL \
             ORDER BY created_at DESC"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LogRule::try_from).collect()
    }

    pub async fn insert(&self, rule: &LogRule) -> Result<i64, RepoError> {
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO log_rules (name, source, address, username, password, es_index, \
             message_field, query_body, threshold, origin, business_type, category, level, \
             creator, updater, responsible_people, crontab, switch, inuse, group_ids, \
             description) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
             $14, $15, $16, $17, $18, $19, $20, $21) RETURNING id",
        )
        .bind(&rule.name)
        .bind(&rule.source)
        .bind(&rule.address)
        .bind(&rule.username)
        .bind(&rule.password)
        .bind(&rule.index)
        .bind(&rule.message_field)
        .bind(&rule.query_body)
        .bind(rule.threshold)
        .bind(&rule.origin)
        .bind(&rule.business_type)
        .bind(rule.category)
        .bind(i16::from(rule.level))
        .bind(&rule.creator)
        .bind(&rule.updater)
        .bind(&rule.responsible_people)
        .bind(&rule.crontab)
        .bind(i16::from(rule.switch))
        .bind(i16::from(rule.inuse))
        .bind(group_ids_csv(&rule.group_ids))
        .bind(&rule.description)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Full-row update by id, including zero-valued fields.
    pub async fn save(&self, rule: &LogRule) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE log_rules SET name = $1, source = $2, address = $3, username = $4, \
             password = $5, es_index = $6, message_field = $7, query_body = $8, \
             threshold = $9, origin = $10, business_type = $11, category = $12, level = $13, \
             creator = $14, updater = $15, responsible_people = $16, crontab = $17, \
             switch = $18, inuse = $19, group_ids = $20, description = $21, \
             updated_at = now() WHERE id = $22 AND deleted_at IS NULL",
        )
        .bind(&rule.name)
        .bind(&rule.source)
        .bind(&rule.address)
        .bind(&rule.username)
        .bind(&rule.password)
        .bind(&rule.index)
        .bind(&rule.message_field)
        .bind(&rule.query_body)
        .bind(rule.threshold)
        .bind(&rule.origin)
        .bind(&rule.business_type)
        .bind(rule.category)
        .bind(i16::from(rule.level))
        .bind(&rule.creator)
        .bind(&rule.updater)
        .bind(&rule.responsible_people)
        .bind(&rule.crontab)
        .bind(i16::from(rule.switch))
        .bind(i16::from(rule.inuse))
        .bind(group_ids_csv(&rule.group_ids))
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
            "UPDATE log_rules SET switch = $1, updater = $2, updated_at = now() \
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

    pub async fn soft_delete(&self, updater: &str, ids: &[i64]) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE log_rules SET inuse = 2, updater = $1, deleted_at = now(), \
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
impl LogRuleSource for LogRepo {
    async fn load_active(&self) -> Result<Vec<LogRule>, BackendError> {
        let rows: Vec<LogRuleRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM log_rules \
             WHERE switch = 1 AND inuse = 1 AND deleted_at IS NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::from)?;
        rows.into_iter()
            .map(|row| LogRule::try_from(row).map_err(BackendError::from))
            .collect()
    }
}
