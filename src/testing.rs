//! Scripted engine used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::gateway::{CommandFailure, InvokeResult, Transport};
use crate::http::EventSource;

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<InvokeResult<Value>>>,
    sticky: HashMap<String, InvokeResult<Value>>,
    calls: Vec<(String, Value)>,
    delays: HashMap<String, Duration>,
}

/// Records every call and answers from per-command scripts. Queued answers
/// are consumed first, then the sticky answer is repeated.
#[derive(Clone, Default)]
pub struct FakeEngine {
    script: Arc<Mutex<Script>>,
    events: Arc<Mutex<HashMap<String, mpsc::Sender<Value>>>>,
}

impl FakeEngine {
    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub fn respond(&self, command: &str, data: Value) {
        self.script().sticky.insert(command.to_string(), Ok(data));
    }

    pub fn respond_once(&self, command: &str, data: Value) {
        self.script()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(Ok(data));
    }

    pub fn fail(&self, command: &str, message: &str) {
        self.script()
            .sticky
            .insert(command.to_string(), Err(CommandFailure::new(message)));
    }

    /// Make every later call to `command` take `delay` before answering.
    pub fn delay(&self, command: &str, delay: Duration) {
        self.script().delays.insert(command.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.script().calls.clone()
    }

    pub fn calls_to(&self, command: &str) -> Vec<Value> {
        self.script()
            .calls
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.script()
            .calls
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Push an event to whoever is listening on `event`.
    pub async fn emit(&self, event: &str, payload: Value) {
        let sender = self
            .events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(event)
            .cloned();
        if let Some(sender) = sender {
            let _ = sender.send(payload).await;
        }
    }

    pub fn is_listening(&self, event: &str) -> bool {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .get(event)
            .is_some_and(|sender| !sender.is_closed())
    }
}

impl Transport for FakeEngine {
    async fn call(&self, command: &str, args: Value) -> InvokeResult<Value> {
        let (answer, delay) = {
            let mut script = self.script();
            script.calls.push((command.to_string(), args));
            let answer = match script
                .queued
                .get_mut(command)
                .and_then(|queue| queue.pop_front())
            {
                Some(next) => next,
                None => script.sticky.get(command).cloned().unwrap_or_else(|| {
                    Err(CommandFailure(format!(
                        "no scripted response for {command}"
                    )))
                }),
            };
            (answer, script.delays.get(command).copied())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

impl EventSource for FakeEngine {
    async fn listen(&self, event: &str) -> Result<mpsc::Receiver<Value>> {
        let (tx, rx) = mpsc::channel(64);
        let mut events = self.events.lock().map_err(|_| anyhow!("event table poisoned"))?;
        events.insert(event.to_string(), tx);
        Ok(rx)
    }
}
