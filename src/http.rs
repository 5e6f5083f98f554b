use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use futures_util::StreamExt;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use urlencoding::encode;

use crate::args::BaseArgs;
use crate::config::{self, Config};
use crate::gateway::{CommandFailure, CommandGateway, Envelope, InvokeResult, Transport};
use crate::logging::mask_secret;

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:17865";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const EVENT_BUFFER: usize = 256;
const RECONNECT_INITIAL_MS: u64 = 500;
const RECONNECT_MAX_SECS: u64 = 10;

/// Subscribes to a named push channel on the engine.
pub trait EventSource: Send + Sync + 'static {
    /// Start listening on `event`. Payloads arrive on the returned receiver
    /// until it is dropped.
    fn listen(&self, event: &str)
        -> impl Future<Output = Result<mpsc::Receiver<Value>>> + Send;
}

/// Where and how to reach the engine, after flags, env and config are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub url: String,
    pub token: Option<String>,
    pub poll_interval: Duration,
}

impl EngineSettings {
    /// Priority: CLI flag / env var > config file > default.
    pub fn resolve(base: &BaseArgs, config: &Config) -> Result<Self> {
        let url = base
            .engine_url
            .clone()
            .or_else(|| config.engine_url.clone())
            .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string());
        let token = base
            .engine_token
            .clone()
            .or_else(|| config.engine_token.clone())
            .filter(|t| !t.trim().is_empty());
        let poll_interval = match config.poll_interval_secs.as_deref() {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid poll_interval_secs '{raw}'"))?;
                if secs == 0 {
                    bail!("poll_interval_secs must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        Ok(Self {
            url,
            token,
            poll_interval,
        })
    }
}

#[derive(Clone)]
pub struct EngineClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl EngineClient {
    pub fn new(settings: &EngineSettings) -> Result<Self> {
        let base_url = Url::parse(settings.url.trim_end_matches('/'))
            .with_context(|| format!("invalid engine URL '{}'", settings.url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("engine URL must use http or https: {}", settings.url);
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        tracing::debug!(
            engine_url = %base_url,
            token = %settings.token.as_deref().map(mask_secret).unwrap_or_else(|| "-".into()),
            "engine client ready"
        );

        Ok(Self {
            http,
            base_url,
            token: settings.token.clone(),
        })
    }

    /// Resolve settings from flags and config files and build a client.
    pub fn from_base(base: &BaseArgs) -> Result<(Self, EngineSettings)> {
        let config = config::load()?;
        let settings = EngineSettings::resolve(base, &config)?;
        Ok((Self::new(&settings)?, settings))
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn invoke_raw(&self, command: &str, args: Value) -> InvokeResult<Value> {
        let url = self.url(&format!("/invoke/{}", encode(command)));
        let body = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };

        let response = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|err| CommandFailure(format!("engine unreachable: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| CommandFailure(format!("failed to read engine response: {err}")))?;

        // Remote errors come back as an envelope even on non-2xx responses.
        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => envelope.into_result(),
            Err(_) if !status.is_success() => Err(CommandFailure(format!(
                "engine request failed ({status}): {}",
                text.trim()
            ))),
            Err(err) => Err(CommandFailure(format!(
                "malformed engine response for {command}: {err}"
            ))),
        }
    }
}

/// Gateway for commands that do not need the event stream.
pub fn connect(base: &BaseArgs) -> Result<CommandGateway<EngineClient>> {
    let (client, _) = EngineClient::from_base(base)?;
    Ok(CommandGateway::new(client))
}

impl Transport for EngineClient {
    async fn call(&self, command: &str, args: Value) -> InvokeResult<Value> {
        self.invoke_raw(command, args).await
    }
}

impl EventSource for EngineClient {
    async fn listen(&self, event: &str) -> Result<mpsc::Receiver<Value>> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let client = self.clone();
        let url = self.url(&format!("/events/{}", encode(event)));
        let event = event.to_string();
        tokio::spawn(async move {
            stream_events(client, url, event, tx).await;
        });
        Ok(rx)
    }
}

fn reconnect_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(RECONNECT_INITIAL_MS))
        .with_multiplier(2.0)
        .with_randomization_factor(0.2)
        .with_max_interval(Duration::from_secs(RECONNECT_MAX_SECS))
        .with_max_elapsed_time(None)
        .build()
}

/// Keep an SSE connection open, forwarding every payload to `tx`. Reconnects
/// with backoff until the receiving side is dropped.
async fn stream_events(client: EngineClient, url: String, event: String, tx: mpsc::Sender<Value>) {
    let mut backoff = reconnect_backoff();

    loop {
        if tx.is_closed() {
            return;
        }

        let request = client
            .authorize(client.http.get(&url))
            .header("accept", "text/event-stream");
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(event = %event, "event stream connected");
                backoff.reset();

                let mut decoder = SseDecoder::default();
                let mut body = Box::pin(response.bytes_stream());
                loop {
                    let chunk = tokio::select! {
                        chunk = body.next() => chunk,
                        _ = tx.closed() => return,
                    };
                    let bytes = match chunk {
                        Some(Ok(bytes)) => bytes,
                        Some(Err(err)) => {
                            tracing::warn!(event = %event, error = %err, "event stream interrupted");
                            break;
                        }
                        None => {
                            tracing::debug!(event = %event, "event stream ended");
                            break;
                        }
                    };
                    for data in decoder.push(&bytes) {
                        match serde_json::from_str::<Value>(&data) {
                            Ok(payload) => {
                                if tx.send(payload).await.is_err() {
                                    return;
                                }
                            }
                            Err(err) => {
                                tracing::warn!(event = %event, error = %err, "discarding malformed event payload");
                            }
                        }
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(event = %event, status = %response.status(), "event stream rejected");
            }
            Err(err) => {
                tracing::warn!(event = %event, error = %err, "event stream unreachable");
            }
        }

        let Some(delay) = backoff.next_backoff() else {
            return;
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tx.closed() => return,
        }
    }
}

/// Incremental decoder for `text/event-stream` bodies. Yields the `data`
/// field of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }

        events
    }
}
