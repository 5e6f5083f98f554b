//! Typed request/response boundary to the collection engine.
//!
//! Every engine command answers with the envelope
//! `{"ok": true, "data": ...}` or `{"ok": false, "error": "..."}`. The
//! gateway unwraps that envelope and decodes `data` into the caller's type.
//! Expected failures (transport errors, remote errors, undecodable payloads)
//! come back as [`CommandFailure`] and never as panics.

use std::future::Future;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Human-readable failure of a single engine command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CommandFailure(pub String);

impl CommandFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type InvokeResult<T> = Result<T, CommandFailure>;

/// Raw response envelope as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn into_result(self) -> InvokeResult<Value> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(CommandFailure(
                self.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

/// Carries one command invocation to the engine and returns the unwrapped
/// `data` payload.
pub trait Transport: Send + Sync + 'static {
    fn call(
        &self,
        command: &str,
        args: Value,
    ) -> impl Future<Output = InvokeResult<Value>> + Send;
}

pub struct CommandGateway<T> {
    transport: T,
}

impl<T: Transport> CommandGateway<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Invoke `command` with a JSON object of arguments and decode the reply.
    ///
    /// `args` must be a JSON object (or `null` for commands without
    /// arguments); anything else is a programming error.
    pub async fn invoke<R: DeserializeOwned>(&self, command: &str, args: Value) -> InvokeResult<R> {
        debug_assert!(
            args.is_object() || args.is_null(),
            "command arguments must be a JSON object"
        );
        let started = Instant::now();
        let result = self.transport.call(command, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let data = match result {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(command, elapsed_ms, error = %err, "command failed");
                return Err(err);
            }
        };
        tracing::debug!(command, elapsed_ms, "command succeeded");

        serde_json::from_value(data).map_err(|err| {
            CommandFailure(format!("unexpected response from {command}: {err}"))
        })
    }
}
