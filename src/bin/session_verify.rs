//! session_verify - check the hash chain of a session log written by defect_stream
//!
//! Recomputes every entry hash from the session genesis and confirms the
//! detections are in temporal order. Exits non-zero on the first mismatch.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use defect_stream::SessionLog;

#[derive(Parser, Debug)]
#[command(name = "session_verify", about = "Verify a defect_stream session log")]
struct Args {
    /// Path to the session log JSON
    #[arg(long, value_name = "PATH")]
    log: PathBuf,

    /// Print each entry while verifying
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let session_log = SessionLog::read_from(&args.log)?;

    println!(
        "session_verify: checking {} (session {})",
        args.log.display(),
        session_log.session_id
    );
    let count = session_log.verify()?;

    if args.verbose {
        for entry in session_log.entries() {
            let detection = entry.detection()?;
            println!(
                "  #{:<4} {} {:<24} {:>5.1}% {}",
                entry.sequence,
                detection.timestamp,
                detection.type_label,
                detection.confidence,
                &entry.entry_hash[..16]
            );
        }
    }

    println!("OK: {} entries, head {}", count, hex::encode(session_log.head_hash()?));
    Ok(())
}
