//! Client composition: submission API, flush, and the periodic flush loop

use crate::buffer::LogBuffer;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::record::Record;
use crate::transport::{HttpTransport, Transport, endpoint_for_token};
use serde_json::{Map, Value};
use std::env;
use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, warn};

/// Asynchronous buffered client for a bulk log-ingestion endpoint.
///
/// Records are enriched, serialized, and buffered on submission; batches go
/// out when the buffer reaches its size threshold, when the periodic timer
/// fires, or on an explicit [`Client::flush`]. Delivery is best-effort: a
/// failed batch is dropped, never re-buffered or retried.
///
/// Cloning is cheap; clones share the same buffer and flush loop. Must be
/// constructed inside a Tokio runtime.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

struct ClientInner {
    config: Config,
    buffer: LogBuffer,
    transport: Arc<dyn Transport>,
    defaults: Map<String, Value>,
    stop: watch::Sender<bool>,
    flusher: StdMutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Create a client shipping to the bulk endpoint derived from the
    /// configured token (or the endpoint override).
    pub fn new(config: Config) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| endpoint_for_token(&config.token));
        let transport = HttpTransport::new(endpoint, config.http_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Convenience constructor: token plus initial tags, everything else
    /// defaulted.
    pub fn with_token<I, S>(token: impl Into<String>, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = Config {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Config::new(token)
        };
        Self::new(config)
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate().map_err(Error::Config)?;

        let mut defaults = config.defaults.clone();
        if !defaults.contains_key("hostname") {
            // Best-effort host identity; omitted when unavailable.
            if let Ok(hostname) = env::var("HOSTNAME") {
                if !hostname.is_empty() {
                    defaults.insert("hostname".to_string(), Value::from(hostname));
                }
            }
        }

        let buffer = LogBuffer::with_tags(config.tags.clone());
        let (stop, stop_rx) = watch::channel(false);

        let client = Client {
            inner: Arc::new(ClientInner {
                config,
                buffer,
                transport,
                defaults,
                stop,
                flusher: StdMutex::new(None),
            }),
        };

        let handle = tokio::spawn(run_flush_loop(client.clone(), stop_rx));
        if let Ok(mut flusher) = client.inner.flusher.lock() {
            *flusher = Some(handle);
        }

        Ok(client)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Enrich, serialize, and buffer a record.
    ///
    /// Assigns `timestamp` (milliseconds since epoch) when absent and fills
    /// default fields without overwriting explicit ones. A serialization
    /// failure is returned synchronously and the record is never buffered.
    /// Reaching the size threshold hands a flush off to a background task.
    pub async fn send(&self, record: Record) -> Result<()> {
        let mut record = record;
        record.ensure_timestamp();
        record.fill_defaults(&self.inner.defaults);
        let encoded = record.to_bytes()?;

        let buffered = self.inner.buffer.append_record(encoded).await;
        debug!(
            buffered,
            threshold = self.inner.config.buffer_size,
            "record buffered"
        );
        self.maybe_spawn_flush(buffered);
        Ok(())
    }

    /// Buffer raw bytes as one entry, bypassing enrichment and
    /// serialization. Same threshold trigger as [`Client::send`].
    pub async fn write_raw(&self, bytes: Vec<u8>) -> Result<()> {
        let buffered = self.inner.buffer.append_raw(bytes).await;
        debug!(
            buffered,
            threshold = self.inner.config.buffer_size,
            "raw entry buffered"
        );
        self.maybe_spawn_flush(buffered);
        Ok(())
    }

    /// Add tags to every future batch.
    pub async fn add_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .buffer
            .add_tags(tags.into_iter().map(Into::into))
            .await;
    }

    /// Current comma-joined tag header, `None` when no tags are set.
    pub async fn tags_header(&self) -> Option<String> {
        self.inner.buffer.tags_header().await
    }

    /// Mirror every buffered entry to the given writer.
    pub async fn set_mirror<W>(&self, writer: W)
    where
        W: Write + Send + 'static,
    {
        self.inner.buffer.set_mirror(Some(Box::new(writer))).await;
    }

    /// Number of entries waiting in the current buffer generation.
    pub async fn pending(&self) -> usize {
        self.inner.buffer.len().await
    }

    /// Snapshot the buffer and transmit it.
    ///
    /// A no-op `Ok` when the buffer is empty. Transport-level failures are
    /// returned and the batch is dropped; an error status from the endpoint
    /// is a soft rejection, logged but not surfaced.
    pub async fn flush(&self) -> Result<()> {
        let Some(batch) = self.inner.buffer.take_batch().await else {
            debug!("no records to flush");
            return Ok(());
        };

        debug!(records = batch.records, bytes = batch.body.len(), "flushing batch");
        let delivery = self.inner.transport.send(&batch).await?;

        if delivery.is_rejection() {
            warn!(
                status = %delivery.status,
                body = %delivery.body,
                records = batch.records,
                "batch rejected by endpoint"
            );
        }

        Ok(())
    }

    /// Stop the periodic flush loop and flush whatever is still buffered.
    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.inner.stop.send(true);

        let handle = self
            .inner
            .flusher
            .lock()
            .ok()
            .and_then(|mut flusher| flusher.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.flush().await
    }

    fn maybe_spawn_flush(&self, buffered: usize) {
        if buffered >= self.inner.config.buffer_size {
            debug!(buffered, "size threshold reached, spawning flush");
            let client = self.clone();
            tokio::spawn(async move {
                if let Err(err) = client.flush().await {
                    warn!(error = %err, "threshold flush failed");
                }
            });
        }
    }
}

/// Periodic flush loop, one per client, running until shutdown.
/// Flush errors are logged and swallowed; the submitters that would care
/// have no return path here.
async fn run_flush_loop(client: Client, mut stop: watch::Receiver<bool>) {
    let mut ticker = interval(client.inner.config.flush_interval);
    // The first tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("flush interval reached");
                if let Err(err) = client.flush().await {
                    warn!(error = %err, "periodic flush failed");
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow_and_update() {
                    break;
                }
            }
        }
    }

    debug!("periodic flush loop stopped");
}
