use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detect::{DetectionProfile, DetectorSource};
use crate::log::DetectionSink;
use crate::pipeline::{DetectionPipeline, FrameOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Stopped,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Cooperative cancellation flag shared with whatever drives the transport.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one [`StreamSession::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub messages: usize,
    pub confirmed: usize,
    pub filtered: usize,
    pub clear: usize,
    pub scanning: usize,
}

impl RunStats {
    fn count(&mut self, outcome: &FrameOutcome) {
        self.messages += 1;
        match outcome {
            FrameOutcome::Confirmed(_) => self.confirmed += 1,
            FrameOutcome::Filtered(_) => self.filtered += 1,
            FrameOutcome::Clear => self.clear += 1,
            FrameOutcome::Scanning => self.scanning += 1,
        }
    }
}

/// One streaming session: `Idle -> Connecting -> Active -> Stopped`.
///
/// Messages are only processed while `Active`. Stopping clears every rolling
/// collection synchronously and trips the cancel handle.
pub struct StreamSession {
    state: SessionState,
    pipeline: DetectionPipeline,
    cancel: CancelHandle,
}

impl StreamSession {
    pub fn new(profile: DetectionProfile) -> Self {
        Self {
            state: SessionState::Idle,
            pipeline: DetectionPipeline::new(profile),
            cancel: CancelHandle::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    /// Handle for the current run. Replaced on every `start()`.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => {
                self.pipeline.reset();
                self.cancel = CancelHandle::new();
                self.transition(SessionState::Connecting);
                Ok(())
            }
            other => Err(anyhow!("cannot start session while {}", other.as_str())),
        }
    }

    /// Transport is up; begin accepting messages.
    pub fn activate(&mut self) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(anyhow!(
                "cannot activate session while {}",
                self.state.as_str()
            ));
        }
        self.transition(SessionState::Active);
        Ok(())
    }

    /// Feed one raw message. `None` when the session is not accepting input.
    pub fn handle_message(&mut self, raw_text: &str, now: u64) -> Option<FrameOutcome> {
        if self.state != SessionState::Active || self.cancel.is_cancelled() {
            log::debug!("ignoring message while {}", self.state.as_str());
            return None;
        }
        Some(self.pipeline.process(raw_text, now))
    }

    /// Stop the session. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.pipeline.reset();
        if self.state != SessionState::Stopped {
            self.transition(SessionState::Stopped);
        }
    }

    /// Drain `source` into `sink` until it is exhausted or the session is
    /// cancelled. The session ends `Stopped` either way.
    ///
    /// A detection the sink refuses is dropped and counted as filtered.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunStats>
    where
        S: DetectorSource + ?Sized,
        K: DetectionSink + ?Sized,
    {
        if self.state != SessionState::Active {
            return Err(anyhow!("cannot run session while {}", self.state.as_str()));
        }
        log::info!("reading detector messages from {} source", source.name());

        let mut stats = RunStats::default();
        while !self.cancel.is_cancelled() {
            let message = match source.next_message() {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    self.stop();
                    return Err(e.context(format!("{} source failed", source.name())));
                }
            };
            let Some(outcome) = self.handle_message(&message.text, message.received_at) else {
                break;
            };
            if let FrameOutcome::Confirmed(detection) = &outcome {
                if let Err(e) = sink.accept(detection) {
                    log::warn!("sink rejected '{}': {:#}", detection.type_label, e);
                    stats.messages += 1;
                    stats.filtered += 1;
                    continue;
                }
            }
            stats.count(&outcome);
        }

        if self.cancel.is_cancelled() {
            log::info!("session cancelled after {} message(s)", stats.messages);
        }
        self.stop();
        Ok(stats)
    }

    fn transition(&mut self, next: SessionState) {
        log::info!("session {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }
}
