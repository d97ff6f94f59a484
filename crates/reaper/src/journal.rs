// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! The watch cursor journal.
//!
//! A single well-known key in a key-value store holds the most recently
//! processed watch cursor, letting the reaper pick up where it left off
//! after a crash. There is exactly one writer (the job watcher).

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::IntoConnectionInfo;
use thiserror::Error;
use tracing::{error, warn};

/// The journal's single key.
pub const EVENT_KEY: &str = "cdsreaper:most-recent-event";

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("could not connect to journal store at {host}:{port} after {attempts} attempts: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        attempts: u32,
        #[source]
        source: redis::RedisError,
    },
}

/// Store addressing, read once at startup.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

/// Errors raised while reading journal configuration from the environment.
#[derive(Debug, Error)]
pub enum JournalConfigError {
    #[error("REDIS_HOST is not set")]
    MissingHost,

    #[error("{0} is not a number: {1}")]
    BadNumber(&'static str, String),
}

impl JournalConfig {
    /// Read configuration from `REDIS_*` environment variables.
    pub fn from_env() -> Result<Self, JournalConfigError> {
        Ok(Self {
            host: std::env::var("REDIS_HOST").map_err(|_| JournalConfigError::MissingHost)?,
            port: parse_var("REDIS_PORT", 6379)?,
            db: parse_var("REDIS_DB_NUM", 0)?,
            password: std::env::var("REDIS_PASS").ok().filter(|s| !s.is_empty()),
        })
    }

    fn connection_info(&self) -> redis::ConnectionInfo {
        let mut redis_info = redis::RedisConnectionInfo::default().set_db(self.db);
        if let Some(password) = &self.password {
            redis_info = redis_info.set_password(password);
        }
        redis::ConnectionAddr::Tcp(self.host.clone(), self.port)
            .into_connection_info()
            .expect("tcp connection address is always valid")
            .set_redis_settings(redis_info)
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, JournalConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| JournalConfigError::BadNumber(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Cursor persistence, behind a trait so the watcher can be tested
/// against an in-memory store.
#[async_trait]
pub trait CursorStore: Send {
    /// The journalled cursor, or `None` when nothing has been recorded.
    async fn most_recent_event(&mut self) -> Result<Option<i64>, JournalError>;

    /// Overwrite the journalled cursor.
    async fn record_processed(&mut self, id: i64) -> Result<(), JournalError>;

    /// Forget the cursor, so the next read starts from "now".
    async fn clear(&mut self) -> Result<(), JournalError>;
}

/// Journal over a redis-style store.
pub struct Journal {
    config: JournalConfig,
    conn: redis::aio::MultiplexedConnection,
    max_retries: u32,
}

impl Journal {
    /// Connect and ping the store, retrying up to `max_retries` times
    /// with `2 × attempt` second backoff.
    ///
    /// Callers start with a small `max_retries` so a dead store at
    /// startup crashes the process where monitoring can see it, then
    /// raise it with [`Journal::set_max_retries`] once running.
    pub async fn connect(config: JournalConfig, max_retries: u32) -> Result<Self, JournalError> {
        let conn = establish(&config, max_retries).await?;
        Ok(Self { config, conn, max_retries })
    }

    /// Raise (or lower) the reconnect budget for subsequent outages.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.max_retries = max_retries;
    }

    async fn reconnect(&mut self) -> Result<(), JournalError> {
        self.conn = establish(&self.config, self.max_retries).await?;
        Ok(())
    }

    /// Read the raw stored value, reconnecting once on a dropped
    /// connection.
    async fn get_raw(&mut self) -> Result<Option<String>, JournalError> {
        match self.conn.get(EVENT_KEY).await {
            Ok(value) => Ok(value),
            Err(e) if connection_lost(&e) => {
                warn!(error = %e, "journal store connection lost, re-establishing");
                self.reconnect().await?;
                Ok(self.conn.get(EVENT_KEY).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CursorStore for Journal {
    async fn most_recent_event(&mut self) -> Result<Option<i64>, JournalError> {
        let raw = self.get_raw().await?;
        match parse_stored(raw) {
            Parsed::Value(id) => Ok(Some(id)),
            Parsed::Absent => Ok(None),
            Parsed::Invalid(value) => {
                error!(
                    value,
                    key = EVENT_KEY,
                    "invalid journalled cursor, deleting; processing will start from the latest event"
                );
                let _: () = self.conn.del(EVENT_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn record_processed(&mut self, id: i64) -> Result<(), JournalError> {
        match self.conn.set(EVENT_KEY, id).await {
            Ok(()) => Ok(()),
            Err(e) if connection_lost(&e) => {
                warn!(error = %e, "journal store connection lost, re-establishing");
                self.reconnect().await?;
                Ok(self.conn.set(EVENT_KEY, id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&mut self) -> Result<(), JournalError> {
        let _: () = self.conn.del(EVENT_KEY).await?;
        Ok(())
    }
}

/// How a stored value reads back.
#[derive(Debug, PartialEq, Eq)]
enum Parsed {
    Value(i64),
    Absent,
    Invalid(String),
}

fn parse_stored(raw: Option<String>) -> Parsed {
    match raw {
        None => Parsed::Absent,
        Some(text) => match text.parse::<i64>() {
            Ok(id) => Parsed::Value(id),
            Err(_) => Parsed::Invalid(text),
        },
    }
}

fn connection_lost(e: &redis::RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal()
}

async fn establish(
    config: &JournalConfig,
    max_retries: u32,
) -> Result<redis::aio::MultiplexedConnection, JournalError> {
    let client = redis::Client::open(config.connection_info())?;
    let mut attempt = 1u32;
    loop {
        match try_establish(&client).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                if attempt >= max_retries {
                    error!(
                        host = %config.host,
                        port = config.port,
                        attempts = attempt,
                        error = %e,
                        "could not connect to journal store"
                    );
                    return Err(JournalError::ConnectFailed {
                        host: config.host.clone(),
                        port: config.port,
                        attempts: attempt,
                        source: e,
                    });
                }
                let delay = Duration::from_secs(2 * u64::from(attempt));
                warn!(
                    host = %config.host,
                    port = config.port,
                    attempt,
                    delay_s = delay.as_secs(),
                    "could not connect to journal store, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

async fn try_establish(
    client: &redis::Client,
) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(conn)
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{CursorStore, JournalError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// In-memory cursor store for watcher tests.
    #[derive(Clone, Default)]
    pub struct FakeCursorStore {
        inner: Arc<Mutex<Option<i64>>>,
    }

    impl FakeCursorStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_cursor(cursor: i64) -> Self {
            Self { inner: Arc::new(Mutex::new(Some(cursor))) }
        }

        /// Current cursor, without going through the trait.
        pub fn cursor(&self) -> Option<i64> {
            *self.inner.lock()
        }
    }

    #[async_trait]
    impl CursorStore for FakeCursorStore {
        async fn most_recent_event(&mut self) -> Result<Option<i64>, JournalError> {
            Ok(*self.inner.lock())
        }

        async fn record_processed(&mut self, id: i64) -> Result<(), JournalError> {
            *self.inner.lock() = Some(id);
            Ok(())
        }

        async fn clear(&mut self) -> Result<(), JournalError> {
            *self.inner.lock() = None;
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCursorStore;

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
