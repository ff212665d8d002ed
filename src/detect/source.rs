use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::BufRead;
use std::time::Duration;

/// One message as received from the detector transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    pub text: String,
    /// Epoch milliseconds at which the message arrived.
    pub received_at: u64,
}

impl RawMessage {
    pub fn new(text: impl Into<String>, received_at: u64) -> Self {
        Self {
            text: text.into(),
            received_at,
        }
    }
}

/// Detector transport seam.
///
/// The vision model connection (persistent socket or periodic request) lives
/// behind this trait. Implementations hand over raw text and never interpret
/// it; parsing happens in the pipeline. Transport failures are returned as
/// errors so the caller can decide on fallback or retry.
pub trait DetectorSource {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Next raw message, or `None` once the source is exhausted.
    fn next_message(&mut self) -> Result<Option<RawMessage>>;
}

/// In-memory queue of messages. Used by tests and demos.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<RawMessage>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>, received_at: u64) {
        self.queue.push_back(RawMessage::new(text, received_at));
    }

    pub fn with(mut self, text: impl Into<String>, received_at: u64) -> Self {
        self.push(text, received_at);
        self
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DetectorSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn next_message(&mut self) -> Result<Option<RawMessage>> {
        Ok(self.queue.pop_front())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayEnvelope {
    t: u64,
    text: String,
}

/// Replays recorded detector output, one message per line.
///
/// A line is either `{"t": <epoch-ms>, "text": "<raw model text>"}` or the raw
/// model text itself, which is stamped with the wall clock on read. Blank
/// lines are skipped.
pub struct ReplaySource<R: BufRead> {
    reader: R,
    line_no: usize,
    pacing: Option<Duration>,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pacing: None,
        }
    }

    /// Sleep `interval` before each message to mimic a live producer.
    pub fn with_pacing(mut self, interval: Duration) -> Self {
        self.pacing = Some(interval);
        self
    }

    fn stamp(line: &str) -> Result<RawMessage> {
        if let Ok(envelope) = serde_json::from_str::<ReplayEnvelope>(line) {
            return Ok(RawMessage::new(envelope.text, envelope.t));
        }
        Ok(RawMessage::new(line, crate::epoch_millis()?))
    }
}

impl<R: BufRead> DetectorSource for ReplaySource<R> {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next_message(&mut self) -> Result<Option<RawMessage>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("reading replay line {}", self.line_no + 1))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(interval) = self.pacing {
                std::thread::sleep(interval);
            }
            return Self::stamp(trimmed)
                .map(Some)
                .map_err(|e| anyhow!("replay line {}: {}", self.line_no, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scripted_source_drains_in_order() -> Result<()> {
        let mut source = ScriptedSource::new().with("a", 1).with("b", 2);
        assert_eq!(source.next_message()?, Some(RawMessage::new("a", 1)));
        assert_eq!(source.next_message()?, Some(RawMessage::new("b", 2)));
        assert_eq!(source.next_message()?, None);
        Ok(())
    }

    #[test]
    fn replay_reads_envelopes_and_skips_blank_lines() -> Result<()> {
        let input = concat!(
            r#"{"t": 1000, "text": "{\"type\":\"clear\"}"}"#,
            "\n\n",
            r#"{"t": 1250, "text": "{\"type\":\"scanning\"}"}"#,
            "\n"
        );
        let mut source = ReplaySource::new(Cursor::new(input));
        let first = source.next_message()?.unwrap();
        assert_eq!(first.received_at, 1000);
        assert_eq!(first.text, r#"{"type":"clear"}"#);
        let second = source.next_message()?.unwrap();
        assert_eq!(second.received_at, 1250);
        assert!(source.next_message()?.is_none());
        Ok(())
    }

    #[test]
    fn replay_stamps_bare_lines_with_wall_clock() -> Result<()> {
        let before = crate::epoch_millis()?;
        let mut source = ReplaySource::new(Cursor::new("{\"type\":\"defect\"}\n"));
        let msg = source.next_message()?.unwrap();
        assert_eq!(msg.text, "{\"type\":\"defect\"}");
        assert!(msg.received_at >= before);
        Ok(())
    }
}
