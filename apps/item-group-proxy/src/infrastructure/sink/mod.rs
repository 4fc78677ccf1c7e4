//! Status Sink Adapters
//!
//! Implementations of [`StatusSink`] plus the writer task that drains
//! forwarded statuses to an output stream.
//!
//! # Architecture
//!
//! The router runs synchronously on the event-loop task and must never
//! wait on output. [`ChannelSink`] hands statuses to a bounded channel with
//! `try_send` and parks whatever does not fit in a local backlog. The event
//! loop awaits [`ChannelSink::flush`] after every event, which pushes the
//! backlog through with `send().await`, so a large fan-out applies
//! backpressure to the input instead of losing statuses. [`run_writer`]
//! owns the receiving side and writes one NDJSON line per status.

use std::collections::VecDeque;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;

use super::codec::{CodecError, JsonLinesCodec};
use crate::application::ports::{ForwardedStatus, SinkError, StatusSink};

// =============================================================================
// Channel Sink
// =============================================================================

/// Sink that queues statuses on a bounded tokio channel.
///
/// Statuses that do not fit are kept in order until [`Self::flush`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<ForwardedStatus>,
    backlog: VecDeque<ForwardedStatus>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ForwardedStatus>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                backlog: VecDeque::new(),
            },
            rx,
        )
    }

    /// Remaining channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Statuses waiting for channel space.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Push the backlog into the channel, waiting for space as needed.
    ///
    /// Fails if the receiver is gone, even with an empty backlog.
    ///
    /// Returns the number of statuses sent.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Closed` if the receiver is gone.
    pub async fn flush(&mut self) -> Result<usize, SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }

        let mut sent = 0;
        while let Some(status) = self.backlog.pop_front() {
            if let Err(mpsc::error::SendError(status)) = self.tx.send(status).await {
                self.backlog.push_front(status);
                return Err(SinkError::Closed);
            }
            sent += 1;
        }

        if sent > 0 {
            tracing::debug!(sent, "Flushed status backlog");
        }
        Ok(sent)
    }
}

impl StatusSink for ChannelSink {
    fn forward(&mut self, status: ForwardedStatus) -> Result<(), SinkError> {
        if !self.backlog.is_empty() {
            if self.tx.is_closed() {
                return Err(SinkError::Closed);
            }
            self.backlog.push_back(status);
            return Ok(());
        }

        match self.tx.try_send(status) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(status)) => {
                self.backlog.push_back(status);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }
}

// =============================================================================
// Collecting Sink
// =============================================================================

/// Sink that keeps every status in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    statuses: Vec<ForwardedStatus>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses received so far.
    #[must_use]
    pub fn statuses(&self) -> &[ForwardedStatus] {
        &self.statuses
    }

    /// Take all statuses, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<ForwardedStatus> {
        std::mem::take(&mut self.statuses)
    }
}

impl StatusSink for CollectingSink {
    fn forward(&mut self, status: ForwardedStatus) -> Result<(), SinkError> {
        self.statuses.push(status);
        Ok(())
    }
}

// =============================================================================
// Writer Task
// =============================================================================

/// Writer task errors.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// Output stream failed.
    #[error("output write failed: {0}")]
    Io(#[from] std::io::Error),
    /// Status could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Drain `rx` into `writer` as NDJSON until every sender is dropped.
///
/// Output is flushed whenever the channel runs dry.
///
/// # Errors
///
/// Returns `WriterError` if writing or encoding fails.
pub async fn run_writer<W>(
    mut rx: mpsc::Receiver<ForwardedStatus>,
    writer: W,
) -> Result<u64, WriterError>
where
    W: AsyncWrite + Unpin,
{
    let codec = JsonLinesCodec::new();
    let mut out = BufWriter::new(writer);
    let mut written = 0u64;

    while let Some(status) = rx.recv().await {
        let mut line = codec.encode(&status)?;
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        written += 1;

        if rx.is_empty() {
            out.flush().await?;
        }
    }

    out.flush().await?;
    tracing::debug!(written, "Status writer finished");
    Ok(written)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{ClientToken, StreamHandle};
    use crate::domain::status::Status;

    fn status(token: u64) -> ForwardedStatus {
        ForwardedStatus {
            token: ClientToken(token),
            handle: StreamHandle(token),
            service: "svcA".to_string(),
            item: format!("ITEM{token}"),
            status: Status::suspect("stale"),
        }
    }

    #[test]
    fn channel_sink_keeps_overflow_and_reports_closed() {
        let (mut sink, rx) = ChannelSink::channel(1);

        assert_eq!(sink.forward(status(1)), Ok(()));
        assert_eq!(sink.capacity(), 0);
        assert_eq!(sink.forward(status(2)), Ok(()));
        assert_eq!(sink.backlog_len(), 1);

        drop(rx);
        assert_eq!(sink.forward(status(3)), Err(SinkError::Closed));
    }

    #[tokio::test]
    async fn flush_delivers_fan_out_larger_than_capacity() {
        let (mut sink, rx) = ChannelSink::channel(4);
        for token in 1..=10 {
            sink.forward(status(token)).unwrap();
        }
        assert_eq!(sink.backlog_len(), 6);

        let writer = tokio::spawn(async move {
            let mut output = Vec::new();
            let written = run_writer(rx, &mut output).await.unwrap();
            (written, String::from_utf8(output).unwrap())
        });

        assert_eq!(sink.flush().await, Ok(6));
        assert_eq!(sink.backlog_len(), 0);
        drop(sink);

        let (written, text) = writer.await.unwrap();
        assert_eq!(written, 10);
        let tokens: Vec<u64> = text
            .lines()
            .map(|l| {
                let value: serde_json::Value = serde_json::from_str(l).unwrap();
                value["token"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(tokens, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn flush_reports_closed_receiver() {
        let (mut sink, rx) = ChannelSink::channel(1);
        sink.forward(status(1)).unwrap();
        sink.forward(status(2)).unwrap();
        drop(rx);

        assert_eq!(sink.flush().await, Err(SinkError::Closed));
        assert_eq!(sink.backlog_len(), 1);
    }

    #[test]
    fn collecting_sink_drains() {
        let mut sink = CollectingSink::new();
        sink.forward(status(1)).unwrap();
        sink.forward(status(2)).unwrap();

        assert_eq!(sink.statuses().len(), 2);
        let drained = sink.drain();
        assert_eq!(drained[1].token, ClientToken(2));
        assert!(sink.statuses().is_empty());
    }

    #[tokio::test]
    async fn writer_emits_one_line_per_status() {
        let (mut sink, rx) = ChannelSink::channel(8);
        sink.forward(status(1)).unwrap();
        sink.forward(status(2)).unwrap();
        drop(sink);

        let mut output = Vec::new();
        let written = run_writer(rx, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(written, 2);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"token\":1"));
        assert!(lines[1].contains("\"item\":\"ITEM2\""));
    }
}
