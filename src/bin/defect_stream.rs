//! defect_stream - run recorded or piped detector output through the filter chain
//!
//! Reads one raw detector message per line (file or stdin), prints every
//! confirmed detection as a JSON line on stdout and optionally writes the
//! hash-chained session log.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use defect_stream::{
    Detection, DetectionProfile, DetectionSink, ProfileKind, ReplaySource, SessionLog,
    StreamConfig, StreamSession,
};

#[derive(Parser, Debug)]
#[command(
    name = "defect_stream",
    about = "Filter a stream of raw vision-model detections into confirmed findings"
)]
struct Args {
    /// Input file with one detector message per line (stdin when omitted)
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Detection profile (forensic|property); overrides DEFECT_STREAM_PROFILE
    #[arg(long, value_name = "KIND")]
    profile: Option<String>,

    /// Sightings required before a detection is confirmed
    #[arg(long, value_name = "N")]
    temporal_threshold: Option<u32>,

    /// Pace replay at the configured transport cadence
    #[arg(long)]
    realtime: bool,

    /// Write the session log to this path
    #[arg(long, value_name = "PATH")]
    log_out: Option<PathBuf>,

    /// Session identifier recorded in the log
    #[arg(long, env = "DEFECT_STREAM_SESSION_ID", default_value = "session")]
    session_id: String,

    /// Print a session summary to stderr when done
    #[arg(long)]
    summary: bool,
}

/// Records each confirmed detection in the session log, then prints it.
struct StdoutSink<W: Write> {
    out: W,
    log: SessionLog,
}

impl<W: Write> DetectionSink for StdoutSink<W> {
    fn accept(&mut self, detection: &Detection) -> Result<()> {
        self.log.accept(detection)?;
        serde_json::to_writer(&mut self.out, detection)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn resolve_profile(args: &Args, cfg: &StreamConfig) -> Result<DetectionProfile> {
    let mut profile = match args.profile.as_deref() {
        Some(kind) => {
            let kind = kind.parse::<ProfileKind>()?;
            if kind == cfg.profile_kind {
                cfg.profile.clone()
            } else {
                DetectionProfile::for_kind(kind)
            }
        }
        None => cfg.profile.clone(),
    };
    if let Some(threshold) = args.temporal_threshold {
        profile = profile.with_temporal_threshold(threshold);
    }
    profile.validate()?;
    Ok(profile)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = StreamConfig::load()?;
    let profile = resolve_profile(&args, &cfg)?;

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    let mut source = ReplaySource::new(reader);
    if args.realtime {
        source = source.with_pacing(cfg.transport.nominal_interval());
    }

    let mut session = StreamSession::new(profile);
    session.start()?;
    let cancel = session.cancel_handle();
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    session.activate()?;

    let mut sink = StdoutSink {
        out: std::io::stdout().lock(),
        log: SessionLog::new(args.session_id.clone()),
    };
    let stats = session.run(&mut source, &mut sink)?;
    log::info!(
        "processed {} message(s): {} confirmed, {} filtered, {} clear, {} scanning",
        stats.messages,
        stats.confirmed,
        stats.filtered,
        stats.clear,
        stats.scanning
    );

    if let Some(path) = &args.log_out {
        sink.log.write_to(path)?;
        log::info!(
            "session log written to {} ({} entries)",
            path.display(),
            sink.log.len()
        );
    }
    if args.summary {
        let summary = sink.log.summary()?;
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}
