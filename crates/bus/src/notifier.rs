// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Outbound event seam, so publishing can be stubbed in tests.

use async_trait::async_trait;

use crate::publisher::PublishError;

/// Something that can place a JSON body on the bus under a routing key.
///
/// `Ok(true)` means the broker confirmed the publish; `Ok(false)` means
/// the message was dropped without retry (oversized body). Errors are
/// terminal: the implementation has already retried to exhaustion.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        routing_key: &str,
        body: &serde_json::Value,
    ) -> Result<bool, PublishError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    async fn notify(
        &self,
        routing_key: &str,
        body: &serde_json::Value,
    ) -> Result<bool, PublishError> {
        (**self).notify(routing_key, body).await
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Notifier, PublishError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded publish call.
    #[derive(Debug, Clone)]
    pub struct SentMessage {
        pub routing_key: String,
        pub body: serde_json::Value,
    }

    #[derive(Default)]
    struct FakeNotifierState {
        sent: Vec<SentMessage>,
        fail_next: Vec<PublishError>,
    }

    /// Fake notifier that records every publish, for tests.
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        inner: Arc<Mutex<FakeNotifierState>>,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// All messages notified so far, in order.
        pub fn sent(&self) -> Vec<SentMessage> {
            self.inner.lock().sent.clone()
        }

        /// Queue an error to be returned by the next `notify` call.
        pub fn fail_next(&self, error: PublishError) {
            self.inner.lock().fail_next.push(error);
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(
            &self,
            routing_key: &str,
            body: &serde_json::Value,
        ) -> Result<bool, PublishError> {
            let mut state = self.inner.lock();
            if !state.fail_next.is_empty() {
                return Err(state.fail_next.remove(0));
            }
            state.sent.push(SentMessage {
                routing_key: routing_key.to_string(),
                body: body.clone(),
            });
            Ok(true)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, SentMessage};
