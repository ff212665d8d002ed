use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{DetectionProfile, ProfileKind};

const LIVE_INTERVAL_MS: u64 = 250;
const PERIODIC_INTERVAL_MS: u64 = 1_500;

/// How frames reach the detector. Only affects replay pacing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Persistent connection, a message roughly every 250 ms.
    #[default]
    Live,
    /// One image per request, roughly every 1.5 s.
    Periodic,
}

impl FromStr for TransportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "periodic" => Ok(Self::Periodic),
            other => Err(anyhow!(
                "unknown transport '{}': expected 'live' or 'periodic'",
                other
            )),
        }
    }
}

impl TransportMode {
    pub fn nominal_interval(self) -> Duration {
        match self {
            TransportMode::Live => Duration::from_millis(LIVE_INTERVAL_MS),
            TransportMode::Periodic => Duration::from_millis(PERIODIC_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StreamConfigFile {
    profile: Option<String>,
    transport: Option<String>,
    overrides: Option<ProfileOverridesFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProfileOverridesFile {
    dedup_window_ms: Option<u64>,
    spatial_tolerance: Option<f64>,
    min_confidence: Option<f64>,
    temporal_window_ms: Option<u64>,
    temporal_threshold: Option<u32>,
    iou_threshold: Option<f64>,
    nms_window_ms: Option<u64>,
    nms_iou_threshold: Option<f64>,
    min_box_area: Option<f64>,
    max_box_area: Option<f64>,
    max_aspect_ratio: Option<f64>,
}

impl ProfileOverridesFile {
    fn apply(self, profile: &mut DetectionProfile) {
        let overrides = self;
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = overrides.$field {
                    profile.$field = value;
                })*
            };
        }
        set!(
            dedup_window_ms,
            spatial_tolerance,
            min_confidence,
            temporal_window_ms,
            temporal_threshold,
            iou_threshold,
            nms_window_ms,
            nms_iou_threshold,
            min_box_area,
            max_box_area,
            max_aspect_ratio,
        );
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub profile_kind: ProfileKind,
    pub profile: DetectionProfile,
    pub transport: TransportMode,
}

impl StreamConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DEFECT_STREAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StreamConfigFile) -> Result<Self> {
        let profile_kind = match file.profile.as_deref() {
            Some(kind) => kind.parse::<ProfileKind>()?,
            None => ProfileKind::default(),
        };
        let transport = match file.transport.as_deref() {
            Some(mode) => mode.parse::<TransportMode>()?,
            None => TransportMode::default(),
        };
        let mut profile = DetectionProfile::for_kind(profile_kind);
        if let Some(overrides) = file.overrides {
            overrides.apply(&mut profile);
        }
        Ok(Self {
            profile_kind,
            profile,
            transport,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(kind) = std::env::var("DEFECT_STREAM_PROFILE") {
            if !kind.trim().is_empty() {
                let kind = kind.parse::<ProfileKind>()?;
                if kind != self.profile_kind {
                    // File overrides belong to the file's profile.
                    self.profile_kind = kind;
                    self.profile = DetectionProfile::for_kind(kind);
                }
            }
        }
        if let Ok(mode) = std::env::var("DEFECT_STREAM_TRANSPORT") {
            if !mode.trim().is_empty() {
                self.transport = mode.parse::<TransportMode>()?;
            }
        }
        if let Ok(value) = std::env::var("DEFECT_STREAM_MIN_CONFIDENCE") {
            self.profile.min_confidence = value.trim().parse().map_err(|_| {
                anyhow!("DEFECT_STREAM_MIN_CONFIDENCE must be a number between 0 and 100")
            })?;
        }
        if let Ok(value) = std::env::var("DEFECT_STREAM_TEMPORAL_THRESHOLD") {
            self.profile.temporal_threshold = value.trim().parse().map_err(|_| {
                anyhow!("DEFECT_STREAM_TEMPORAL_THRESHOLD must be a positive integer")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.profile
            .validate()
            .map_err(|e| anyhow!("invalid {} profile: {}", self.profile_kind.as_str(), e))
    }
}

fn read_config_file(path: &Path) -> Result<StreamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
