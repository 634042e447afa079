//! In-memory accumulation of serialized records, batch tags, and the
//! optional mirror writer, all guarded by one lock.
//!
//! Network transmission never happens under this lock; flushes snapshot the
//! buffer and send outside it.

use std::io::Write;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Immutable snapshot of one buffer generation.
///
/// Created under the buffer lock, transmitted outside it, then dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    /// Newline-joined serialized records
    pub body: Vec<u8>,
    /// Number of records in the body
    pub records: usize,
    /// Comma-joined tag list captured at snapshot time
    pub tags: Option<String>,
}

struct BufferState {
    entries: Vec<Vec<u8>>,
    tags: Vec<String>,
    mirror: Option<Box<dyn Write + Send>>,
}

/// Thread-safe buffer of opaque serialized-record byte blocks.
///
/// Append order is preserved within a generation; `take_batch` swaps the
/// buffer out atomically so concurrent flushes always observe disjoint
/// snapshots.
pub struct LogBuffer {
    state: Mutex<BufferState>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_tags(Vec::new())
    }

    pub fn with_tags(tags: Vec<String>) -> Self {
        Self {
            state: Mutex::new(BufferState {
                entries: Vec::new(),
                tags,
                mirror: None,
            }),
        }
    }

    /// Append one serialized record, mirroring it newline-terminated.
    /// Returns the buffer length after the append.
    pub async fn append_record(&self, entry: Vec<u8>) -> usize {
        self.append(entry, true).await
    }

    /// Append raw bytes verbatim as a single entry, mirrored as-is.
    /// Returns the buffer length after the append.
    pub async fn append_raw(&self, entry: Vec<u8>) -> usize {
        self.append(entry, false).await
    }

    async fn append(&self, entry: Vec<u8>, terminate_mirror: bool) -> usize {
        let mut state = self.state.lock().await;

        if let Some(mirror) = state.mirror.as_mut() {
            let write = mirror.write_all(&entry).and_then(|_| {
                if terminate_mirror {
                    mirror.write_all(b"\n")
                } else {
                    Ok(())
                }
            });
            if let Err(err) = write {
                // Best-effort side channel; a broken mirror never fails a submission.
                warn!(error = %err, "mirror write failed");
            }
        }

        state.entries.push(entry);
        state.entries.len()
    }

    /// Append tags to every future batch. No de-duplication; an empty
    /// iterator leaves the registry unchanged.
    pub async fn add_tags<I>(&self, tags: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.state.lock().await;
        state.tags.extend(tags);
    }

    /// Comma-joined tag list, `None` when no tags are registered.
    pub async fn tags_header(&self) -> Option<String> {
        let state = self.state.lock().await;
        join_tags(&state.tags)
    }

    /// Snapshot and clear the buffer in one critical section.
    ///
    /// Returns `None` when the buffer is empty. The tag header is captured
    /// in the same critical section, so it is consistent with concurrent
    /// `add_tags` calls.
    pub async fn take_batch(&self) -> Option<Batch> {
        let mut state = self.state.lock().await;

        if state.entries.is_empty() {
            return None;
        }

        let entries = std::mem::take(&mut state.entries);
        let records = entries.len();
        let body = entries.join(&b'\n');
        let tags = join_tags(&state.tags);
        drop(state);

        debug!(records, bytes = body.len(), "buffer snapshot taken");

        Some(Batch {
            body,
            records,
            tags,
        })
    }

    /// Install or replace the side-channel writer.
    pub async fn set_mirror(&self, mirror: Option<Box<dyn Write + Send>>) {
        let mut state = self.state.lock().await;
        state.mirror = mirror;
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn join_tags(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(","))
    }
}
