use std::io::Cursor;

use serde_json::json;

use defect_stream::{
    Detection, DetectionProfile, FilterReason, FrameOutcome, ReplaySource, ScriptedSource,
    SessionLog, SessionState, StreamSession,
};

const CRACK: &str =
    r#"{"type":"defect","defectType":"crack","confidence":85,"box_2d":[200,150,450,180]}"#;

fn active(profile: DetectionProfile) -> StreamSession {
    let mut session = StreamSession::new(profile);
    session.start().expect("start");
    session.activate().expect("activate");
    session
}

#[test]
fn stop_resets_every_stage() {
    let mut session = active(DetectionProfile::property());
    assert!(session.handle_message(CRACK, 1_000).unwrap().confirmed().is_some());
    assert_eq!(
        session.handle_message(CRACK, 1_250),
        Some(FrameOutcome::Filtered(FilterReason::Duplicate))
    );
    assert!(!session.pipeline().is_idle());

    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.pipeline().is_idle());

    // Restarted session: the same detection is new to dedup, temporal and NMS.
    session.start().unwrap();
    session.activate().unwrap();
    let again = session.handle_message(CRACK, 1_500).unwrap();
    assert!(again.confirmed().is_some());
}

#[test]
fn stop_is_synchronous_and_blocks_further_input() {
    let mut session = active(DetectionProfile::forensic());
    let cancel = session.cancel_handle();
    session.stop();
    assert!(cancel.is_cancelled());
    assert_eq!(session.handle_message(CRACK, 0), None);
    assert!(session.activate().is_err());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn cancel_from_another_thread_ends_run() {
    let mut session = active(DetectionProfile::property());
    let cancel = session.cancel_handle();
    std::thread::spawn(move || cancel.cancel())
        .join()
        .expect("cancel thread");

    let mut source = ScriptedSource::new().with(CRACK, 0);
    let mut sink: Vec<Detection> = Vec::new();
    let stats = session.run(&mut source, &mut sink).unwrap();
    assert_eq!(stats.messages, 0);
    assert!(sink.is_empty());
    assert_eq!(session.state(), SessionState::Stopped);
}

fn envelope(t: u64, text: serde_json::Value) -> String {
    json!({ "t": t, "text": text.to_string() }).to_string()
}

fn defect(label: &str, confidence: f64, box_2d: Option<[f64; 4]>) -> serde_json::Value {
    let mut payload = json!({ "type": "defect", "defectType": label, "confidence": confidence });
    if let Some(b) = box_2d {
        payload["box_2d"] = json!(b);
    }
    payload
}

#[test]
fn replayed_session_produces_verifiable_log() {
    let replay = [
        envelope(1_000, json!({ "type": "scanning" })),
        envelope(1_250, defect("crack", 85.0, Some([200.0, 150.0, 450.0, 180.0]))),
        envelope(1_500, defect("crack", 86.0, Some([202.0, 150.0, 452.0, 180.0]))),
        envelope(1_750, defect("exposed wiring", 77.0, Some([600.0, 600.0, 750.0, 700.0]))),
        envelope(2_000, defect("leak", 40.0, None)),
    ]
    .join("\n");
    let mut source = ReplaySource::new(Cursor::new(replay));
    let mut log = SessionLog::new("inspection-7");
    let mut session = active(DetectionProfile::property());

    let stats = session.run(&mut source, &mut log).unwrap();
    assert_eq!(stats.messages, 5);
    assert_eq!(stats.confirmed, 2);
    assert_eq!(stats.filtered, 2);
    assert_eq!(stats.scanning, 1);

    assert_eq!(log.verify().unwrap(), 2);
    let summary = log.summary().unwrap();
    assert_eq!(summary.by_category.get("structural"), Some(&1));
    assert_eq!(summary.by_category.get("electrical"), Some(&1));
    assert_eq!(summary.first_timestamp, Some(1_250));
    assert_eq!(summary.last_timestamp, Some(1_750));
}

#[test]
fn late_response_is_dropped_without_ending_the_stream() {
    let replay = [
        envelope(2_000, defect("crack", 85.0, Some([200.0, 150.0, 450.0, 180.0]))),
        envelope(1_500, defect("leak", 80.0, Some([600.0, 600.0, 800.0, 800.0]))),
        envelope(2_500, defect("outlet", 80.0, Some([50.0, 50.0, 150.0, 150.0]))),
    ]
    .join("\n");
    let mut source = ReplaySource::new(Cursor::new(replay));
    let mut log = SessionLog::new("periodic-1");
    let mut session = active(DetectionProfile::property());

    let stats = session.run(&mut source, &mut log).expect("late frame is not fatal");
    assert_eq!(stats.messages, 3);
    assert_eq!(stats.confirmed, 2);
    assert_eq!(stats.filtered, 1);
    assert_eq!(log.len(), 2);
    assert_eq!(log.verify().unwrap(), 2);
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.pipeline().is_idle());
}

#[test]
fn sessions_do_not_share_state() {
    let mut a = active(DetectionProfile::property());
    let mut b = active(DetectionProfile::property());
    assert!(a.handle_message(CRACK, 0).unwrap().confirmed().is_some());
    assert!(b.handle_message(CRACK, 0).unwrap().confirmed().is_some());
}
