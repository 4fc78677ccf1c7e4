//! Event Input Loop
//!
//! Reads NDJSON event lines, routes each decoded event, and pushes the
//! resulting statuses to the outbound channel before reading the next line.
//!
//! Undecodable lines are logged, counted and skipped. The loop ends at EOF,
//! on shutdown, or when the outbound side has gone away.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::codec::JsonLinesCodec;
use super::config::EventInput;
use super::metrics::{record_decode_error, record_outcome, set_index_stats};
use super::sink::ChannelSink;
use crate::application::services::ItemGroupRouter;

/// Boxed line source used by the binary.
pub type EventReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Input loop errors.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// Input file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Configured path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Reading a line failed.
    #[error("failed to read event input: {0}")]
    Read(#[from] std::io::Error),

    /// The status writer is gone.
    #[error("outbound status channel closed")]
    OutputClosed,
}

/// Counters for one run of the input loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Lines read, including skipped ones.
    pub lines: u64,
    /// Events routed.
    pub events: u64,
    /// Lines that failed to decode.
    pub decode_errors: u64,
    /// Whether the loop stopped because shutdown was requested.
    pub interrupted: bool,
}

/// Open the configured event input.
///
/// # Errors
///
/// Returns `InputError::Open` if the input file cannot be opened.
pub async fn open_input(input: &EventInput) -> Result<EventReader, InputError> {
    Ok(match input {
        EventInput::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
        EventInput::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| InputError::Open {
                    path: path.display().to_string(),
                    source,
                })?;
            Box::new(BufReader::new(file))
        }
    })
}

/// Route every input line until EOF or shutdown.
///
/// The sink backlog is flushed after each event, so a fan-out larger than
/// the channel waits for the writer rather than dropping statuses.
///
/// # Errors
///
/// Returns an error if reading fails or the outbound channel closes.
pub async fn run_event_loop<R>(
    reader: R,
    router: &mut ItemGroupRouter<ChannelSink>,
    shutdown: &CancellationToken,
) -> Result<LoopSummary, InputError>
where
    R: AsyncBufRead + Unpin,
{
    let codec = JsonLinesCodec::new();
    let mut lines = reader.lines();
    let mut summary = LoopSummary::default();

    loop {
        let line = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("Shutdown requested, stopping event loop");
                summary.interrupted = true;
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            tracing::info!(lines = summary.lines, "Event input reached EOF");
            break;
        };
        summary.lines += 1;

        let event = match codec.decode(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                summary.decode_errors += 1;
                record_decode_error();
                tracing::warn!(line = summary.lines, error = %e, "Skipping undecodable event");
                continue;
            }
        };

        let outcome = router.handle(event);
        summary.events += 1;
        record_outcome(&outcome);
        if outcome.changed {
            set_index_stats(&router.index().stats());
        }

        router
            .sink_mut()
            .flush()
            .await
            .map_err(|_| InputError::OutputClosed)?;
    }

    router
        .sink_mut()
        .flush()
        .await
        .map_err(|_| InputError::OutputClosed)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::RouterOptions;
    use crate::infrastructure::sink::run_writer;

    const INPUT: &str = r#"{"type":"item_request","service":"svcA","handle":1,"token":11,"item":"IBM.N"}
{"type":"item_request","service":"svcA","handle":2,"token":12,"item":"MSFT.O"}
this is not an event
{"type":"item_request","service":"svcA","handle":3,"token":13,"item":"VOD.L"}
{"type":"item_response","handle":1,"group":[1]}
{"type":"item_response","handle":2,"group":[1]}
{"type":"item_response","handle":3,"group":[1]}
{"type":"group_status","service":"svcA","group":[1],"status":{"stream_state":"closed"}}
"#;

    #[tokio::test]
    async fn bad_lines_are_skipped_and_routing_continues() {
        let (sink, rx) = ChannelSink::channel(2);
        let mut router = ItemGroupRouter::new(sink, RouterOptions::default());
        let writer = tokio::spawn(async move {
            let mut output = Vec::new();
            run_writer(rx, &mut output).await.unwrap()
        });

        let summary = run_event_loop(
            BufReader::new(INPUT.as_bytes()),
            &mut router,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.lines, 8);
        assert_eq!(summary.events, 7);
        assert_eq!(summary.decode_errors, 1);
        assert!(!summary.interrupted);
        assert!(router.index().is_empty());

        drop(router);
        assert_eq!(writer.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn shutdown_stops_before_reading() {
        let (sink, _rx) = ChannelSink::channel(2);
        let mut router = ItemGroupRouter::new(sink, RouterOptions::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let summary = run_event_loop(BufReader::new(INPUT.as_bytes()), &mut router, &shutdown)
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.lines, 0);
        assert!(router.index().is_empty());
    }

    #[tokio::test]
    async fn closed_output_ends_the_loop() {
        let (sink, rx) = ChannelSink::channel(2);
        drop(rx);
        let mut router = ItemGroupRouter::new(sink, RouterOptions::default());

        let result = run_event_loop(
            BufReader::new(INPUT.as_bytes()),
            &mut router,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(InputError::OutputClosed)));
        assert_eq!(router.stats().events_processed, 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = EventInput::File(dir.path().join("absent.ndjson"));

        assert!(matches!(
            open_input(&input).await,
            Err(InputError::Open { .. })
        ));
    }
}
