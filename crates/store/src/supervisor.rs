//! SQLite-backed event store that owns its own connectivity.

use std::{
    future::Future,
    sync::{
        Mutex as StdMutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, SecondsFormat, Utc},
    courier_common::{ChatEvent, EventKind},
    courier_config::{StoreConfig, is_valid_identifier},
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
    tokio::sync::Mutex,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, gauge, store as store_metrics};

use crate::{
    Error, Result,
    error::Context,
    record::{ConnectionState, PersistedRecord, StoreStats},
    store::EventStore,
};

struct Inner {
    pool: Option<SqlitePool>,
    state: ConnectionState,
}

/// Owns the durable-store pool and reconnects whenever it is asked for a
/// connection it does not have.
///
/// Connect and probe are serialized by an async mutex. There is no backoff:
/// every `ensure_connected` on a failed store is a fresh attempt.
pub struct StoreSupervisor {
    enabled: bool,
    uri: String,
    database: String,
    table: String,
    timeout: Duration,
    inner: Mutex<Inner>,
    attempts: AtomicU64,
    saved: AtomicU64,
    last_error: StdMutex<Option<String>>,
}

impl StoreSupervisor {
    /// Build an unconnected supervisor. The table name is checked here since
    /// it is spliced into SQL.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if !is_valid_identifier(&config.table) {
            return Err(Error::invalid_config(format!(
                "table name {:?} is not a valid identifier",
                config.table
            )));
        }
        Ok(Self {
            enabled: config.enabled,
            uri: config.uri.clone(),
            database: config.database.clone(),
            table: config.table.clone(),
            timeout: config.timeout(),
            inner: Mutex::new(Inner {
                pool: None,
                state: ConnectionState::Unconnected,
            }),
            attempts: AtomicU64::new(0),
            saved: AtomicU64::new(0),
            last_error: StdMutex::new(None),
        })
    }

    /// First connect at startup. Failure is logged, never fatal.
    pub async fn initialize(&self) -> bool {
        if !self.enabled {
            info!(database = %self.database, "durable store disabled, events go to the fallback file");
            return false;
        }
        let ok = self.ensure_connected().await;
        if !ok {
            warn!(
                database = %self.database,
                "durable store unavailable at startup, using the fallback file until it recovers"
            );
        }
        ok
    }

    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(pool) = inner.pool.take() {
            pool.close().await;
            info!(database = %self.database, "store connection closed");
        }
        inner.state = ConnectionState::Unconnected;
        #[cfg(feature = "metrics")]
        gauge!(store_metrics::CONNECTED).set(0.0);
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn stats(&self) -> StoreStats {
        let connected = self.state().await == ConnectionState::Connected;
        StoreStats {
            enabled: self.enabled,
            connected,
            connection_attempts: self.attempts.load(Ordering::Relaxed),
            messages_saved: self.saved.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            database: self.database.clone(),
            table: self.table.clone(),
        }
    }

    // ── Connection management ──────────────────────────────────────────────

    async fn connect(&self, inner: &mut Inner) -> bool {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        #[cfg(feature = "metrics")]
        counter!(store_metrics::CONNECT_ATTEMPTS_TOTAL).increment(1);

        if let Some(stale) = inner.pool.take() {
            stale.close().await;
        }

        match self.open_pool().await {
            Ok(pool) => {
                inner.pool = Some(pool);
                inner.state = ConnectionState::Connected;
                self.set_last_error(None);
                #[cfg(feature = "metrics")]
                gauge!(store_metrics::CONNECTED).set(1.0);
                info!(
                    database = %self.database,
                    table = %self.table,
                    attempt,
                    "connected to durable store"
                );
                true
            },
            Err(e) => {
                inner.state = ConnectionState::Failed;
                self.set_last_error(Some(e.to_string()));
                #[cfg(feature = "metrics")]
                gauge!(store_metrics::CONNECTED).set(0.0);
                error!(database = %self.database, attempt, error = %e, "failed to connect to durable store");
                false
            },
        }
    }

    async fn open_pool(&self) -> Result<SqlitePool> {
        let in_memory = self.uri.contains(":memory:") || self.uri.contains("mode=memory");
        let options = SqlitePoolOptions::new().acquire_timeout(self.timeout);
        // An in-memory database lives and dies with its one connection.
        let options = if in_memory {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            options.max_connections(5)
        };

        let pool = self.bounded(options.connect(&self.uri)).await?;
        if let Err(e) = self.create_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(pool)
    }

    /// Table and indexes, idempotent. Runs on every fresh pool so a store
    /// that was recreated while we were away gets its structure back.
    async fn create_schema(&self, pool: &SqlitePool) -> Result<()> {
        let table = &self.table;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id          TEXT PRIMARY KEY,
                kind        TEXT NOT NULL,
                timestamp   TEXT NOT NULL,
                server      TEXT,
                server_id   INTEGER,
                channel     TEXT NOT NULL,
                channel_id  INTEGER NOT NULL,
                author      TEXT NOT NULL,
                author_id   INTEGER NOT NULL,
                content     TEXT NOT NULL,
                attachments TEXT NOT NULL,
                embeds      INTEGER NOT NULL,
                reactions   INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            )"
        );
        self.bounded(sqlx::query(&create).execute(pool))
            .await
            .with_context(|| format!("failed to create table {table}"))?;

        let indexes = [
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_timestamp ON {table} (timestamp)"),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_server_channel ON {table} (server_id, channel_id)"
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{table}_author ON {table} (author_id)"),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_server_channel_ts ON {table} (server_id, channel_id, timestamp DESC)"
            ),
        ];
        for sql in &indexes {
            // Missing indexes only cost query speed.
            if let Err(e) = self.bounded(sqlx::query(sql).execute(pool)).await {
                warn!(table = %table, error = %e, "failed to create store index");
            }
        }
        debug!(table = %table, "store schema ready");
        Ok(())
    }

    async fn pool(&self) -> Result<SqlitePool> {
        let inner = self.inner.lock().await;
        match (&inner.state, &inner.pool) {
            (ConnectionState::Connected, Some(pool)) => Ok(pool.clone()),
            _ => Err(Error::unavailable(format!(
                "store is {}",
                inner.state.as_str()
            ))),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                timeout: self.timeout,
            })?
            .map_err(Error::from)
    }

    fn set_last_error(&self, message: Option<String>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = message;
    }
}

#[async_trait]
impl EventStore for StoreSupervisor {
    async fn ensure_connected(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let mut inner = self.inner.lock().await;
        if inner.state == ConnectionState::Connected
            && let Some(pool) = &inner.pool
        {
            match self.bounded(sqlx::query("SELECT 1").execute(pool)).await {
                Ok(_) => return true,
                Err(e) => {
                    warn!(database = %self.database, error = %e, "store liveness probe failed, reconnecting");
                    inner.state = ConnectionState::Failed;
                    self.set_last_error(Some(e.to_string()));
                },
            }
        }
        self.connect(&mut inner).await
    }

    async fn upsert(&self, record: &PersistedRecord) -> Result<()> {
        let pool = self.pool().await?;
        let event = &record.event;
        let sql = format!(
            "INSERT INTO {} (id, kind, timestamp, server, server_id, channel, channel_id,
                             author, author_id, content, attachments, embeds, reactions, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                timestamp = excluded.timestamp,
                server = excluded.server,
                server_id = excluded.server_id,
                channel = excluded.channel,
                channel_id = excluded.channel_id,
                author = excluded.author,
                author_id = excluded.author_id,
                content = excluded.content,
                attachments = excluded.attachments,
                embeds = excluded.embeds,
                reactions = excluded.reactions,
                created_at = excluded.created_at",
            self.table
        );
        let attachments = serde_json::to_string(&event.attachment_urls)?;
        let query = sqlx::query(&sql)
            .bind(&record.key)
            .bind(event.kind.as_str())
            .bind(&event.timestamp)
            .bind(&event.server)
            .bind(event.server_id.map(|v| v as i64))
            .bind(&event.channel)
            .bind(event.channel_id as i64)
            .bind(&event.author)
            .bind(event.author_id as i64)
            .bind(&event.content)
            .bind(&attachments)
            .bind(i64::from(event.embed_count))
            .bind(i64::from(event.reaction_count))
            .bind(
                record
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            );

        if let Err(e) = self.bounded(query.execute(&pool)).await {
            self.set_last_error(Some(e.to_string()));
            return Err(e);
        }
        self.saved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let pool = self.pool().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let n: i64 = self
            .bounded(sqlx::query_scalar::<_, i64>(&sql).fetch_one(&pool))
            .await?;
        Ok(n as u64)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<PersistedRecord>> {
        let pool = self.pool().await?;
        let sql = format!(
            "SELECT id, kind, timestamp, server, server_id, channel, channel_id, author,
                    author_id, content, attachments, embeds, reactions, created_at
             FROM {}
             ORDER BY timestamp DESC
             LIMIT ?",
            self.table
        );
        let rows = self
            .bounded(sqlx::query(&sql).bind(limit as i64).fetch_all(&pool))
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let attachments: String = row.try_get("attachments")?;
            let created_at: String = row.try_get("created_at")?;
            let event = ChatEvent {
                kind: kind.parse::<EventKind>()?,
                timestamp: row.try_get("timestamp")?,
                server: row.try_get("server")?,
                server_id: row
                    .try_get::<Option<i64>, _>("server_id")?
                    .map(|v| v as u64),
                channel: row.try_get("channel")?,
                channel_id: row.try_get::<i64, _>("channel_id")? as u64,
                author: row.try_get("author")?,
                author_id: row.try_get::<i64, _>("author_id")? as u64,
                content: row.try_get("content")?,
                attachment_urls: serde_json::from_str(&attachments)?,
                embed_count: row.try_get::<i64, _>("embeds")? as u32,
                reaction_count: row.try_get::<i64, _>("reactions")? as u32,
            };
            records.push(PersistedRecord {
                key: row.try_get("id")?,
                event,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .with_context(|| format!("invalid created_at {created_at:?}"))?
                    .with_timezone(&Utc),
            });
        }
        Ok(records)
    }
}
