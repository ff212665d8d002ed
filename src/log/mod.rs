use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::detect::Detection;

/// Hashes a log entry payload with the previous chain hash.
pub fn hash_entry(prev_hash: &[u8; 32], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Chain anchor for a session: binds every entry to the session id.
pub fn genesis_hash(session_id: &str) -> [u8; 32] {
    hash_entry(&[0u8; 32], session_id.as_bytes())
}

fn decode_hash(label: &str, value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value).map_err(|e| anyhow!("{} is not hex: {}", label, e))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("{} must be 32 bytes", label))
}

/// Consumer of confirmed detections.
pub trait DetectionSink {
    fn accept(&mut self, detection: &Detection) -> Result<()>;
}

impl DetectionSink for Vec<Detection> {
    fn accept(&mut self, detection: &Detection) -> Result<()> {
        self.push(detection.clone());
        Ok(())
    }
}

/// One chained record. `payload` is the detection's JSON exactly as hashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub payload: String,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LogEntry {
    pub fn detection(&self) -> Result<Detection> {
        serde_json::from_str(&self.payload)
            .with_context(|| format!("entry {} payload is not a detection", self.sequence))
    }
}

/// Append-only, hash-chained record of every detection surfaced in a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    pub session_id: String,
    entries: Vec<LogEntry>,
}

impl SessionLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the last entry, or the genesis hash for an empty log.
    pub fn head_hash(&self) -> Result<[u8; 32]> {
        match self.entries.last() {
            Some(entry) => decode_hash("entry_hash", &entry.entry_hash),
            None => Ok(genesis_hash(&self.session_id)),
        }
    }

    pub fn append(&mut self, detection: &Detection) -> Result<&LogEntry> {
        if let Some(last) = self.entries.last() {
            let prev = last.detection()?;
            if detection.timestamp < prev.timestamp {
                return Err(anyhow!(
                    "detection at {} precedes last entry at {}",
                    detection.timestamp,
                    prev.timestamp
                ));
            }
        }
        let prev_hash = self.head_hash()?;
        let payload = serde_json::to_string(detection)?;
        let entry_hash = hash_entry(&prev_hash, payload.as_bytes());
        self.entries.push(LogEntry {
            sequence: self.entries.len() as u64,
            payload,
            prev_hash: hex::encode(prev_hash),
            entry_hash: hex::encode(entry_hash),
        });
        self.entries
            .last()
            .ok_or_else(|| anyhow!("session log append lost its entry"))
    }

    /// Recompute the chain from genesis. Returns the number of entries.
    pub fn verify(&self) -> Result<usize> {
        let mut prev_hash = genesis_hash(&self.session_id);
        let mut last_timestamp = 0u64;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.sequence != idx as u64 {
                return Err(anyhow!(
                    "entry {} has sequence {}",
                    idx,
                    entry.sequence
                ));
            }
            let recorded_prev = decode_hash("prev_hash", &entry.prev_hash)?;
            if recorded_prev != prev_hash {
                return Err(anyhow!("prev_hash mismatch at entry {}", idx));
            }
            let computed = hash_entry(&prev_hash, entry.payload.as_bytes());
            if hex::encode(computed) != entry.entry_hash {
                return Err(anyhow!("entry_hash mismatch at entry {}", idx));
            }
            let detection = entry.detection()?;
            if detection.timestamp < last_timestamp {
                return Err(anyhow!("entry {} is out of temporal order", idx));
            }
            last_timestamp = detection.timestamp;
            prev_hash = computed;
        }
        Ok(self.entries.len())
    }

    pub fn summary(&self) -> Result<SessionSummary> {
        let mut summary = SessionSummary {
            session_id: self.session_id.clone(),
            ..SessionSummary::default()
        };
        for entry in &self.entries {
            let detection = entry.detection()?;
            summary.total += 1;
            *summary
                .by_category
                .entry(detection.category.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_kind
                .entry(detection.kind.as_str().to_string())
                .or_default() += 1;
            summary.max_confidence = Some(
                summary
                    .max_confidence
                    .map_or(detection.confidence, |c| c.max(detection.confidence)),
            );
            summary.first_timestamp.get_or_insert(detection.timestamp);
            summary.last_timestamp = Some(detection.timestamp);
        }
        Ok(summary)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| anyhow!("invalid session log: {}", e))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write session log {}", path.display()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session log {}", path.display()))?;
        Self::from_json(&raw)
    }
}

impl DetectionSink for SessionLog {
    fn accept(&mut self, detection: &Detection) -> Result<()> {
        let (sequence, entry_hash) = {
            let entry = self.append(detection)?;
            (entry.sequence, entry.entry_hash.clone())
        };
        ::log::debug!(
            "session {} entry {} {}",
            self.session_id,
            sequence,
            entry_hash
        );
        Ok(())
    }
}

/// Aggregate view of a session for the report renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    pub max_confidence: Option<f64>,
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
}
