// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Consumer runtime: one connection, one channel and queue per handler.
//!
//! Un-processable messages (bad JSON, schema failures, handler rejects)
//! are dead-lettered to a shared durable queue so they can be inspected
//! after the fact without blocking the main queues.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, Connection, ExchangeKind};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BusConfig;
use crate::handler::{MessageHandler, MessageMeta};
use crate::outcome::Outcome;
use crate::publisher::connect_with_attempts;

/// Direct exchange un-processable messages are routed to.
pub const DEAD_LETTER_EXCHANGE: &str = "cdsresponder-dlx";

/// Durable queue bound to the dead-letter exchange.
pub const DEAD_LETTER_QUEUE: &str = "cdsresponder-dlq";

/// Errors that stop the consumer runloop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("could not connect to the broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("could not wire exchange {exchange}: {source}")]
    Wiring {
        exchange: String,
        #[source]
        source: lapin::Error,
    },

    #[error("broker connection closed")]
    ConnectionClosed,

    #[error("consume failed: {0}")]
    Consume(#[source] lapin::Error),

    #[error("acknowledgement failed: {0}")]
    Acknowledge(#[source] lapin::Error),
}

struct Binding {
    exchange: String,
    handler: Arc<dyn MessageHandler>,
}

/// Event-driven dispatcher over one broker connection.
///
/// Handler invocations are serialised with respect to the loop; a handler
/// blocking on the cluster or the filesystem stalls the connection until
/// it completes, which is the intended back-pressure.
pub struct ConsumerRuntime {
    config: BusConfig,
    bindings: Vec<Binding>,
}

impl ConsumerRuntime {
    pub fn new(config: BusConfig) -> Self {
        Self { config, bindings: Vec::new() }
    }

    /// Register `handler` against a topic exchange.
    pub fn bind(mut self, exchange: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.bindings.push(Binding { exchange: exchange.into(), handler });
        self
    }

    /// Connect, wire every binding and consume until `shutdown` fires
    /// (clean stop) or the connection fails (error, caller exits
    /// non-zero so the orchestrator restarts the process).
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ConsumerError> {
        let connection =
            connect_with_attempts(&self.config).await.map_err(ConsumerError::Connect)?;
        info!(host = %self.config.host, "broker connection opened");

        let mut streams = Vec::new();
        for binding in &self.bindings {
            let consumer = wire_handler(&connection, binding).await.map_err(|source| {
                ConsumerError::Wiring { exchange: binding.exchange.clone(), source }
            })?;
            let exchange = binding.exchange.clone();
            let handler = Arc::clone(&binding.handler);
            streams.push(
                consumer
                    .map(move |delivery| (exchange.clone(), Arc::clone(&handler), delivery))
                    .boxed(),
            );
        }

        let mut merged = stream::select_all(streams);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping consumer runloop");
                    return Ok(());
                }
                next = merged.next() => match next {
                    None => return Err(ConsumerError::ConnectionClosed),
                    Some((_, _, Err(e))) => return Err(ConsumerError::Consume(e)),
                    Some((exchange, handler, Ok(delivery))) => {
                        dispatch(&exchange, handler.as_ref(), delivery)
                            .await
                            .map_err(ConsumerError::Acknowledge)?;
                    }
                },
            }
        }
    }
}

/// Declare the dead-letter pair, the handler's exchange and queue, bind
/// them and start a non-exclusive manual-ack consumer.
async fn wire_handler(
    connection: &Connection,
    binding: &Binding,
) -> Result<lapin::Consumer, lapin::Error> {
    let handler = binding.handler.as_ref();
    info!(
        exchange = %binding.exchange,
        routing_pattern = handler.routing_pattern(),
        "establishing consumer"
    );

    let channel = connection.create_channel().await?;
    declare_dead_letter_pair(&channel).await?;

    channel
        .exchange_declare(
            &binding.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;

    let queue_name = format!("cdsresponder-{}", sanitize_routing_key(handler.routing_pattern()));
    let mut args = FieldTable::default();
    args.insert("x-dead-letter-exchange".into(), AMQPValue::LongString(DEAD_LETTER_EXCHANGE.into()));
    args.insert("x-dead-letter-routing-key".into(), AMQPValue::LongString(DEAD_LETTER_QUEUE.into()));
    channel.queue_declare(&queue_name, QueueDeclareOptions::default(), args).await?;
    channel
        .queue_bind(
            &queue_name,
            &binding.exchange,
            handler.routing_pattern(),
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let consumer = channel
        .basic_consume(
            &queue_name,
            "",
            BasicConsumeOptions { no_ack: false, exclusive: false, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    info!(queue = %queue_name, exchange = %binding.exchange, "consumer started");
    Ok(consumer)
}

async fn declare_dead_letter_pair(channel: &Channel) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            DEAD_LETTER_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(
            DEAD_LETTER_QUEUE,
            QueueDeclareOptions { durable: true, ..Default::default() },
            FieldTable::default(),
        )
        .await?;
    // Dead-lettered messages are re-routed under the queue's own name so
    // the direct exchange has a single stable binding key.
    channel
        .queue_bind(
            DEAD_LETTER_QUEUE,
            DEAD_LETTER_EXCHANGE,
            DEAD_LETTER_QUEUE,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
}

/// Decode, validate and hand a delivery to its handler, then translate
/// the outcome into a broker acknowledgement.
async fn dispatch(
    exchange: &str,
    handler: &dyn MessageHandler,
    delivery: Delivery,
) -> Result<(), lapin::Error> {
    let tag = delivery.delivery_tag;
    let routing_key = delivery.routing_key.as_str().to_string();
    debug!(exchange, routing_key = %routing_key, tag, "received message");

    let body = match decode_and_validate(handler.validator(), &delivery.data) {
        Ok(body) => body,
        Err(e) => {
            error!(
                exchange,
                routing_key = %routing_key,
                tag,
                error = %e,
                content = %String::from_utf8_lossy(&delivery.data),
                "message did not validate, dead-lettering"
            );
            return delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
        }
    };

    let meta = MessageMeta { exchange, routing_key: &routing_key, delivery_tag: tag };
    match handler.receive(meta, body).await {
        Outcome::Ack => delivery.ack(BasicAckOptions::default()).await,
        Outcome::Nack(reason) => {
            warn!(
                routing_key = %routing_key,
                tag,
                reason = reason.as_deref().unwrap_or("unspecified"),
                "message un-processable, nacking without requeue"
            );
            delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await
        }
        Outcome::Requeue(reason) => {
            warn!(
                routing_key = %routing_key,
                tag,
                reason = reason.as_deref().unwrap_or("unspecified"),
                "message not processed, requeueing"
            );
            delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await
        }
    }
}

/// Errors from the pre-handler decode and validation stage.
#[derive(Debug, Error)]
pub(crate) enum ValidateError {
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("body is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema validation failed: {0}")]
    Schema(String),
}

pub(crate) fn decode_and_validate(
    validator: &jsonschema::Validator,
    data: &[u8],
) -> Result<serde_json::Value, ValidateError> {
    let text = std::str::from_utf8(data)?;
    let value: serde_json::Value = serde_json::from_str(text)?;
    validator.validate(&value).map_err(|e| ValidateError::Schema(e.to_string()))?;
    Ok(value)
}

/// Queue-name fragment from a routing pattern: word characters only.
pub(crate) fn sanitize_routing_key(routing_key: &str) -> String {
    routing_key.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect()
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
