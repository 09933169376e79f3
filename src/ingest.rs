//! Message ingestion pipeline.
//!
//! Two layers:
//! - [`ingest`] validates raw messages, maps them to [`IndexedUnit`]s and
//!   inserts them through the [`IndexManager`]. It never fails; the outcome
//!   is reported in an [`IngestReport`].
//! - [`index_conversations`] drives a [`ChatSource`]: resolve channels,
//!   fetch one page per channel, drop short messages, ingest per channel.

use serde::Serialize;
use std::fmt;

use crate::error::{RecallError, Result};
use crate::index::IndexManager;
use crate::models::{Channel, IndexedUnit, RawMessage};
use crate::sources::ChatSource;

/// Outcome of one [`ingest`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Messages handed to the pipeline.
    pub received: usize,
    /// Messages dropped by validation.
    pub skipped: usize,
    /// Units committed to the index, including batches that landed before
    /// an insertion failure.
    pub indexed: usize,
    /// Insertion failure detail, if any.
    pub error: Option<String>,
}

/// Validate one raw message and turn it into an indexable unit.
///
/// `text` and `id` must be non-empty strings; `user` and `ts` are copied
/// verbatim.
pub fn to_unit(raw: RawMessage) -> Result<IndexedUnit> {
    let text = raw
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RecallError::Validation("missing or empty text".to_string()))?;
    let id = raw
        .id
        .filter(|i| !i.is_empty())
        .ok_or_else(|| RecallError::Validation("missing or empty id".to_string()))?;

    Ok(IndexedUnit {
        content: text,
        id,
        author_id: raw.user,
        timestamp: raw.ts,
    })
}

/// Validate, transform, and index a batch of raw messages.
///
/// Invalid messages are dropped with a debug event. Insertion failures are
/// logged at error level and recorded in the report; they are never
/// returned to the caller.
pub async fn ingest(manager: &IndexManager, raw_messages: Vec<RawMessage>) -> IngestReport {
    let mut report = IngestReport {
        received: raw_messages.len(),
        ..Default::default()
    };

    let mut units = Vec::with_capacity(raw_messages.len());
    for raw in raw_messages {
        let id = raw.id.clone();
        match to_unit(raw) {
            Ok(unit) => units.push(unit),
            Err(e) => {
                tracing::debug!(id = ?id, reason = %e, "skipping message");
                report.skipped += 1;
            }
        }
    }

    if units.is_empty() {
        tracing::debug!(received = report.received, "no valid messages to index");
        return report;
    }

    let count = units.len();
    match manager.insert(units).await {
        Ok(indexed) => {
            report.indexed = indexed;
            tracing::info!(indexed, skipped = report.skipped, "messages ingested");
        }
        Err(e) => {
            if let RecallError::IndexInsert { committed, .. } = &e {
                report.indexed = *committed;
            }
            tracing::error!(
                error = %e,
                attempted = count,
                indexed = report.indexed,
                "failed to index messages"
            );
            report.error = Some(e.to_string());
        }
    }

    report
}

/// Result of an [`index_conversations`] run. `Display` gives the
/// user-facing summary.
///
/// `failed_channels` counts channels whose insertion hit an error; the
/// summary then ends with `" ({k} channel(s) failed)"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed {
        messages: usize,
        channels: usize,
        failed_channels: usize,
    },
    NothingIndexed {
        channels: usize,
        failed_channels: usize,
    },
    NoChannels,
    Failed(String),
}

fn failed_suffix(failed_channels: usize) -> String {
    if failed_channels == 0 {
        String::new()
    } else {
        format!(" ({} channel(s) failed)", failed_channels)
    }
}

impl fmt::Display for IndexOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOutcome::Indexed {
                messages,
                channels,
                failed_channels,
            } => write!(
                f,
                "Successfully indexed {} messages from {} channel(s).{}",
                messages,
                channels,
                failed_suffix(*failed_channels)
            ),
            IndexOutcome::NothingIndexed {
                channels,
                failed_channels,
            } => write!(
                f,
                "No new messages were indexed from the {} channel(s) processed.{}",
                channels,
                failed_suffix(*failed_channels)
            ),
            IndexOutcome::NoChannels => {
                write!(f, "No channels found to index or unable to fetch channels.")
            }
            IndexOutcome::Failed(detail) => write!(f, "Error indexing conversations: {}", detail),
        }
    }
}

/// Options for [`index_conversations`].
#[derive(Debug, Clone)]
pub struct IndexRequest {
    /// Index only this channel; otherwise every listed channel.
    pub channel_id: Option<String>,
    pub limit_per_channel: usize,
    /// Messages whose trimmed text has fewer characters are dropped.
    pub min_text_chars: usize,
}

/// Pull messages from `source` and index them.
///
/// The index is created first (placeholder-seeded if absent) so that a
/// later search sees an initialized index even when nothing was indexed.
pub async fn index_conversations(
    manager: &IndexManager,
    source: &dyn ChatSource,
    request: &IndexRequest,
) -> IndexOutcome {
    if let Err(e) = manager.get_or_create_index(false, Vec::new()).await {
        tracing::error!(error = %e, "index initialization failed");
        return IndexOutcome::Failed(e.to_string());
    }

    let channels = match request.channel_id.as_deref().filter(|c| !c.is_empty()) {
        Some(id) => vec![Channel {
            id: id.to_string(),
            name: None,
        }],
        None => source.list_channels().await,
    };

    if channels.is_empty() {
        return IndexOutcome::NoChannels;
    }

    let mut indexed = 0usize;
    let mut failed_channels = 0usize;
    for channel in &channels {
        let messages: Vec<RawMessage> = source
            .list_messages(&channel.id, request.limit_per_channel)
            .await
            .into_iter()
            .filter(|m| {
                m.text
                    .as_deref()
                    .map(|t| t.trim().chars().count() >= request.min_text_chars)
                    .unwrap_or(false)
            })
            .collect();

        if messages.is_empty() {
            tracing::debug!(channel = %channel.id, "no messages to index");
            continue;
        }

        let report = ingest(manager, messages).await;
        tracing::info!(
            channel = %channel.id,
            source = source.name(),
            indexed = report.indexed,
            skipped = report.skipped,
            "channel processed"
        );
        indexed += report.indexed;
        if report.error.is_some() {
            failed_channels += 1;
        }
    }

    if indexed > 0 {
        IndexOutcome::Indexed {
            messages: indexed,
            channels: channels.len(),
            failed_channels,
        }
    } else {
        IndexOutcome::NothingIndexed {
            channels: channels.len(),
            failed_channels,
        }
    }
}
