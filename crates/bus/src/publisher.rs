// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Confirming topic publisher.
//!
//! The watch loop that feeds this publisher has no durable outbound
//! buffer: an event must be on the broker (confirmed) before the journal
//! cursor may advance, otherwise a crash between publish and
//! cursor-write would silently drop the event. `notify` therefore blocks
//! until the broker confirms, and all retry paths are bounded loops.

use std::time::Duration;

use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::BusConfig;

/// Largest body we will hand to the broker (RabbitMQ's default
/// `max_message_size`). Oversized bodies are dropped, not retried.
pub const MAX_BODY_BYTES: usize = 128 * 1024 * 1024;

/// Errors from publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("message could not be serialised: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not establish broker channel after {attempts} attempts: {source}")]
    SetupFailed {
        attempts: u32,
        #[source]
        source: lapin::Error,
    },

    #[error("message undeliverable after {attempts} attempts")]
    Undeliverable { attempts: u32 },
}

/// One publish attempt's failure mode.
enum AttemptError {
    /// The broker returned the message as unroutable (or refused it).
    Returned,
    /// The connection or channel is gone; setup must run again.
    Connection(lapin::Error),
}

struct ChannelHandle {
    // Dropping the connection tears the channel down with it.
    _connection: Connection,
    channel: Channel,
}

/// Topic-exchange publisher with publisher confirms enabled.
pub struct Publisher {
    config: BusConfig,
    exchange: String,
    max_retry_attempts: u32,
    state: Mutex<Option<ChannelHandle>>,
}

impl Publisher {
    /// Connect and declare the exchange, retrying setup up to
    /// `max_retry_attempts` times with linear backoff.
    pub async fn connect(
        config: BusConfig,
        exchange: impl Into<String>,
        max_retry_attempts: u32,
    ) -> Result<Self, PublishError> {
        let publisher = Self {
            config,
            exchange: exchange.into(),
            max_retry_attempts,
            state: Mutex::new(None),
        };
        let state = publisher.setup().await?;
        *publisher.state.lock().await = Some(state);
        Ok(publisher)
    }

    /// The exchange this publisher was bound to at construction.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Serialise `body` to JSON and publish it, returning once the broker
    /// has confirmed (or definitively refused) the message.
    ///
    /// `Ok(false)` means the body exceeded [`MAX_BODY_BYTES`] and was not
    /// sent. Unroutable messages are retried with `5 × attempt` second
    /// backoff; connection failures re-run setup and retry, counted
    /// against the same attempt budget.
    pub async fn notify<T: Serialize>(
        &self,
        routing_key: &str,
        body: &T,
    ) -> Result<bool, PublishError> {
        let payload = serde_json::to_vec(body)?;
        if payload.len() > MAX_BODY_BYTES {
            error!(routing_key, bytes = payload.len(), "message body too long for the broker");
            return Ok(false);
        }

        let mut attempt = 1u32;
        loop {
            debug!(routing_key, exchange = %self.exchange, attempt, "publishing");
            match self.publish_once(routing_key, &payload).await {
                Ok(()) => return Ok(true),
                Err(AttemptError::Returned) => {
                    if attempt >= self.max_retry_attempts {
                        error!(
                            routing_key,
                            attempts = attempt,
                            "message could not be delivered, giving up"
                        );
                        return Err(PublishError::Undeliverable { attempts: attempt });
                    }
                    let delay = unroutable_backoff(attempt);
                    warn!(routing_key, attempt, delay_s = delay.as_secs(), "message returned, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Connection(e)) => {
                    if attempt >= self.max_retry_attempts {
                        error!(routing_key, attempts = attempt, error = %e, "broker connection lost, giving up");
                        return Err(PublishError::SetupFailed { attempts: attempt, source: e });
                    }
                    warn!(routing_key, error = %e, "broker connection error, re-opening");
                    let state = self.setup().await?;
                    *self.state.lock().await = Some(state);
                }
            }
            attempt += 1;
        }
    }

    async fn publish_once(&self, routing_key: &str, payload: &[u8]) -> Result<(), AttemptError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(|| {
            AttemptError::Connection(lapin::Error::InvalidChannelState(
                lapin::ChannelState::Closed,
            ))
        })?;

        let confirm = state
            .channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions { mandatory: true, ..Default::default() },
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(AttemptError::Connection)?
            .await
            .map_err(AttemptError::Connection)?;

        match confirm {
            // A returned message is confirmed but never reached a queue.
            Confirmation::Ack(Some(_)) | Confirmation::Nack(_) => Err(AttemptError::Returned),
            Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
        }
    }

    /// Open a connection and channel, declare the exchange and enable
    /// confirms. Bounded retry with `2 × attempt` second backoff.
    async fn setup(&self) -> Result<ChannelHandle, PublishError> {
        let mut attempt = 1u32;
        loop {
            match self.try_setup().await {
                Ok(state) => return Ok(state),
                Err(e) => {
                    if attempt >= self.max_retry_attempts {
                        return Err(PublishError::SetupFailed { attempts: attempt, source: e });
                    }
                    let delay = setup_backoff(attempt);
                    error!(
                        attempt,
                        delay_s = delay.as_secs(),
                        error = %e,
                        "could not establish broker channel, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_setup(&self) -> Result<ChannelHandle, lapin::Error> {
        let connection = connect_with_attempts(&self.config).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;
        Ok(ChannelHandle { _connection: connection, channel })
    }

    /// Construct a publisher with no broker channel, for tests that only
    /// exercise the pre-publish paths.
    #[cfg(test)]
    pub(crate) fn disconnected(config: BusConfig, exchange: &str, max_retry_attempts: u32) -> Self {
        Self {
            config,
            exchange: exchange.to_string(),
            max_retry_attempts,
            state: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl crate::notifier::Notifier for Publisher {
    async fn notify(
        &self,
        routing_key: &str,
        body: &serde_json::Value,
    ) -> Result<bool, PublishError> {
        Publisher::notify(self, routing_key, body).await
    }
}

/// TCP-level connect with the configured attempt count and fixed delay.
pub(crate) async fn connect_with_attempts(config: &BusConfig) -> Result<Connection, lapin::Error> {
    let uri = config.amqp_uri();
    let mut attempt = 1u32;
    loop {
        match Connection::connect(&uri, ConnectionProperties::default()).await {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                if attempt >= config.connection_attempts {
                    return Err(e);
                }
                warn!(
                    host = %config.host,
                    attempt,
                    error = %e,
                    "broker connect failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(config.retry_delay)).await;
                attempt += 1;
            }
        }
    }
}

fn setup_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2 * u64::from(attempt))
}

fn unroutable_backoff(attempt: u32) -> Duration {
    Duration::from_secs(5 * u64::from(attempt))
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
