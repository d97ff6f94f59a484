// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Handler verdicts, translated to broker acknowledgements by the
//! consumer runtime.

/// What the runtime should do with a delivery once its handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Processed; acknowledge the message.
    Ack,
    /// Cannot be processed, now or later; reject so the broker routes it
    /// to the dead-letter queue. The reason is logged, not transmitted.
    Nack(Option<String>),
    /// Transient failure; put the message back on the queue for another
    /// attempt.
    Requeue(Option<String>),
}

impl Outcome {
    /// Shorthand for a reasoned [`Outcome::Nack`].
    pub fn nack(reason: impl Into<String>) -> Self {
        Outcome::Nack(Some(reason.into()))
    }

    /// Shorthand for a reasoned [`Outcome::Requeue`].
    pub fn requeue(reason: impl Into<String>) -> Self {
        Outcome::Requeue(Some(reason.into()))
    }
}
