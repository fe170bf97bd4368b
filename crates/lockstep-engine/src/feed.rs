//! File-backed input producer.
//!
//! Reads a JSON Lines file of [`InputEvent`]s and submits them through the
//! ingress, waiting for space when the queue is full. Dropping the producer
//! handle when the file is exhausted lets the schedule end once every
//! queued input has been applied.

use std::path::PathBuf;

use lockstep_events::{Ingress, SubmitError};
use lockstep_types::InputEvent;
use tracing::{info, warn};

use crate::error::EngineError;

/// Parse an input file into events, in file order.
///
/// # Errors
///
/// Returns [`EngineError::Input`] naming the first unreadable line.
pub fn parse_inputs(contents: &str) -> Result<Vec<InputEvent>, EngineError> {
    (1_usize..)
        .zip(contents.lines())
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(line, text)| {
            serde_json::from_str(text).map_err(|e| EngineError::Input {
                line,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Submit every event in `path`, then drop the producer.
///
/// Returns the number of events handed to the ingress. Events the log later
/// refuses (duplicates, late ticks) are counted here and reported by the
/// schedule.
///
/// # Errors
///
/// Returns [`EngineError::Input`] if the file cannot be read or parsed.
pub async fn feed_file(path: PathBuf, producer: Ingress) -> Result<u64, EngineError> {
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| EngineError::Input {
            line: 0,
            message: format!("{}: {e}", path.display()),
        })?;
    let events = parse_inputs(&contents)?;
    info!(path = %path.display(), events = events.len(), "Feeding inputs");

    let mut submitted: u64 = 0;
    for event in events {
        match producer.submit_wait(event).await {
            Ok(()) => submitted = submitted.saturating_add(1),
            Err(SubmitError::Closed) => {
                warn!(submitted, "Ingress closed before the input file was exhausted");
                break;
            }
            Err(err @ SubmitError::Backpressure { .. }) => {
                warn!(error = %err, "Unexpected backpressure from a waiting submit");
            }
        }
    }
    info!(submitted, "Input file exhausted");
    Ok(submitted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_events::{EventLog, ingress};
    use lockstep_types::{Action, EntityId, SourceId};

    use super::*;

    const INPUTS: &str = r#"{"tick":1,"source_id":4,"sequence":0,"action":{"kind":"rest","entity":1}}

{"tick":2,"source_id":4,"sequence":0,"action":{"kind":"move","entity":1,"dx":1,"dy":0}}
"#;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let events = parse_inputs(INPUTS).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events.first(),
            Some(&InputEvent::new(1, SourceId(4), 0, Action::Rest { entity: EntityId(1) }))
        );
    }

    #[test]
    fn bad_line_is_named() {
        let err = parse_inputs("{\"tick\":1}\n").unwrap_err();
        assert!(matches!(err, EngineError::Input { line: 1, .. }));
    }

    #[tokio::test]
    async fn fed_events_reach_the_log_and_close_the_ingress() {
        let path = std::env::temp_dir().join(format!("lockstep-inputs-{}.jsonl", uuid::Uuid::new_v4()));
        std::fs::write(&path, INPUTS).unwrap();
        let (producer, mut receiver) = ingress(1);

        let feeder = tokio::spawn(feed_file(path.clone(), producer));
        let mut log = EventLog::new();
        let mut closed = false;
        while !closed {
            closed = receiver.drain_into(&mut log).closed;
            tokio::task::yield_now().await;
        }
        assert_eq!(feeder.await.unwrap().unwrap(), 2);
        assert_eq!(log.len(), 2);

        let _ = std::fs::remove_file(&path);
    }
}
