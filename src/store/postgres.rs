//! Postgres adapter for the event table.
//!
//! The table is a plain key-value layout keyed by `event_id`. Conditional
//! writes map onto `ON CONFLICT DO NOTHING` and `WHERE event_id = ...`
//! clauses so every primitive stays a single statement.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};

use crate::config::StoreConfig;
use crate::models::{Event, EventPatch, EventStatus};
use crate::store::backend::{BackendError, EventBackend, ScanPage};

/// Columns whose names are SQL keywords and must be quoted in statements.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("date", "\"date\""),
    ("location", "\"location\""),
    ("status", "\"status\""),
];

const SELECT_COLUMNS: &str = "event_id, title, description, \"date\", \"location\", capacity, \
                              organizer, \"status\", created_at, updated_at";

fn column(name: &'static str) -> &'static str {
    COLUMN_ALIASES
        .iter()
        .find(|(plain, _)| *plain == name)
        .map(|(_, quoted)| *quoted)
        .unwrap_or(name)
}

#[derive(Debug, FromRow)]
struct EventRow {
    event_id: String,
    title: String,
    description: String,
    date: String,
    location: String,
    capacity: i64,
    organizer: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = BackendError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let status: EventStatus = row
            .status
            .parse()
            .map_err(|e| BackendError::Transport(Box::new(e)))?;
        let capacity =
            u32::try_from(row.capacity).map_err(|e| BackendError::Transport(Box::new(e)))?;

        Ok(Event {
            event_id: row.event_id,
            title: row.title,
            description: row.description,
            date: row.date,
            location: row.location,
            capacity,
            organizer: row.organizer,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PostgresBackend {
    pool: PgPool,
    table: String,
    timeout: Duration,
    page_size: usize,
}

impl PostgresBackend {
    /// Opens the pool and creates the table when it does not exist yet.
    pub async fn connect(config: &StoreConfig) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| BackendError::Transport(Box::new(e)))?;

        let backend = Self {
            pool,
            table: config.table_name.clone(),
            timeout: config.timeout,
            page_size: config.scan_page_size,
        };
        backend.ensure_table().await?;

        tracing::info!(table = %backend.table, "Connected to event table");
        Ok(backend)
    }

    async fn ensure_table(&self) -> Result<(), BackendError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                event_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                \"date\" TEXT NOT NULL,
                \"location\" TEXT NOT NULL,
                capacity BIGINT NOT NULL,
                organizer TEXT NOT NULL,
                \"status\" TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                CHECK (created_at <= updated_at)
            )",
            table = self.table
        );
        self.bounded(sqlx::query(&ddl).execute(&self.pool)).await?;
        Ok(())
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, BackendError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| BackendError::Transport(Box::new(e))),
            Err(_) => Err(BackendError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn assign<'q, 'b>(
    query: &'b mut QueryBuilder<'q, Postgres>,
    name: &'static str,
) -> &'b mut QueryBuilder<'q, Postgres> {
    query.push(", ").push(column(name)).push(" = ")
}

/// Builds the conditional update. `updated_at` never drops below `created_at`.
fn update_query<'a>(
    table: &str,
    event_id: &'a str,
    patch: &'a EventPatch,
    updated_at: DateTime<Utc>,
) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(format!("UPDATE {} SET updated_at = GREATEST(", table));
    query.push_bind(updated_at).push(", created_at)");

    if let Some(title) = &patch.title {
        assign(&mut query, "title").push_bind(title.as_str());
    }
    if let Some(description) = &patch.description {
        assign(&mut query, "description").push_bind(description.as_str());
    }
    if let Some(date) = &patch.date {
        assign(&mut query, "date").push_bind(date.as_str());
    }
    if let Some(location) = &patch.location {
        assign(&mut query, "location").push_bind(location.as_str());
    }
    if let Some(capacity) = patch.capacity {
        assign(&mut query, "capacity").push_bind(i64::from(capacity));
    }
    if let Some(organizer) = &patch.organizer {
        assign(&mut query, "organizer").push_bind(organizer.as_str());
    }
    if let Some(status) = patch.status {
        assign(&mut query, "status").push_bind(status.as_str());
    }

    query
        .push(" WHERE event_id = ")
        .push_bind(event_id)
        .push(" RETURNING ")
        .push(SELECT_COLUMNS);
    query
}

#[async_trait]
impl EventBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn put_if_absent(&self, event: &Event) -> Result<(), BackendError> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (event_id) DO NOTHING",
            self.table, SELECT_COLUMNS
        );
        let result = self
            .bounded(
                sqlx::query(&sql)
                    .bind(&event.event_id)
                    .bind(&event.title)
                    .bind(&event.description)
                    .bind(&event.date)
                    .bind(&event.location)
                    .bind(i64::from(event.capacity))
                    .bind(&event.organizer)
                    .bind(event.status.as_str())
                    .bind(event.created_at)
                    .bind(event.updated_at)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::ConditionFailed);
        }
        Ok(())
    }

    async fn get(&self, event_id: &str) -> Result<Option<Event>, BackendError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE event_id = $1",
            SELECT_COLUMNS, self.table
        );
        let row = self
            .bounded(
                sqlx::query_as::<_, EventRow>(&sql)
                    .bind(event_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Event::try_from).transpose()
    }

    async fn scan(
        &self,
        start_after: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage, BackendError> {
        let take = limit.min(self.page_size);
        let sql = format!(
            "SELECT {} FROM {} WHERE ($1::TEXT IS NULL OR event_id > $1) \
             ORDER BY event_id LIMIT $2",
            SELECT_COLUMNS, self.table
        );
        // One extra row tells us whether another page follows.
        let mut rows = self
            .bounded(
                sqlx::query_as::<_, EventRow>(&sql)
                    .bind(start_after)
                    .bind(i64::try_from(take).unwrap_or(i64::MAX).saturating_add(1))
                    .fetch_all(&self.pool),
            )
            .await?;

        let has_more = rows.len() > take;
        rows.truncate(take);

        let items = rows
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let last_key = if has_more {
            items.last().map(|e| e.event_id.clone())
        } else {
            None
        };
        Ok(ScanPage { items, last_key })
    }

    async fn update_if_exists(
        &self,
        event_id: &str,
        patch: &EventPatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Event, BackendError> {
        let mut query = update_query(&self.table, event_id, patch, updated_at);
        let row = self
            .bounded(
                query
                    .build_query_as::<EventRow>()
                    .fetch_optional(&self.pool),
            )
            .await?;

        match row {
            Some(row) => Event::try_from(row),
            None => Err(BackendError::ConditionFailed),
        }
    }

    async fn delete_if_exists(&self, event_id: &str) -> Result<(), BackendError> {
        let sql = format!("DELETE FROM {} WHERE event_id = $1", self.table);
        let result = self
            .bounded(sqlx::query(&sql).bind(event_id).execute(&self.pool))
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::ConditionFailed);
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
