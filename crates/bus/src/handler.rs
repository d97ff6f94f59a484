// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Message-handler traits.
//!
//! Handlers declare a routing pattern and a compiled JSON schema; the
//! runtime validates each delivery against the schema before the handler
//! sees it, so handlers work with a strongly-typed record rather than a
//! loose map. [`TypedHandler`] is the trait handlers implement;
//! [`MessageHandler`] is its object-safe erasure used by the runtime.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::outcome::Outcome;

/// Delivery metadata handed to handlers alongside the decoded body.
#[derive(Debug, Clone, Copy)]
pub struct MessageMeta<'a> {
    pub exchange: &'a str,
    pub routing_key: &'a str,
    pub delivery_tag: u64,
}

/// Object-safe handler interface consumed by the runtime.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Topic pattern this handler's queue is bound with.
    fn routing_pattern(&self) -> &str;

    /// Compiled schema the runtime validates deliveries against.
    fn validator(&self) -> &jsonschema::Validator;

    /// Called with a schema-valid JSON body.
    async fn receive(&self, meta: MessageMeta<'_>, body: serde_json::Value) -> Outcome;
}

/// Strongly-typed handler: the runtime validates, this layer decodes.
#[async_trait]
pub trait TypedHandler: Send + Sync {
    /// Decoded message type. The schema must guarantee this decode
    /// cannot fail for valid messages.
    type Message: DeserializeOwned + Send;

    fn routing_pattern(&self) -> &str;

    fn validator(&self) -> &jsonschema::Validator;

    async fn on_message(&self, meta: MessageMeta<'_>, message: Self::Message) -> Outcome;
}

#[async_trait]
impl<T: TypedHandler> MessageHandler for T {
    fn routing_pattern(&self) -> &str {
        TypedHandler::routing_pattern(self)
    }

    fn validator(&self) -> &jsonschema::Validator {
        TypedHandler::validator(self)
    }

    async fn receive(&self, meta: MessageMeta<'_>, body: serde_json::Value) -> Outcome {
        match serde_json::from_value(body) {
            Ok(message) => self.on_message(meta, message).await,
            Err(e) => {
                // Schema passed but the typed decode did not; the schema
                // and the message type have drifted apart.
                tracing::error!(
                    routing_key = meta.routing_key,
                    error = %e,
                    "schema-valid message failed typed decode"
                );
                Outcome::nack(format!("typed decode failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
