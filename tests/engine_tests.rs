// tests/engine_tests.rs - End-to-end engine behaviour through the public API
use freethrow_coach::evaluator::{BodyRegion, Finding, POSE_UNCLEAR};
use freethrow_coach::feed::FeedReader;
use freethrow_coach::geometry::{angle_degrees, Point};
use freethrow_coach::{
    BoundingBox, DetectedObject, Engine, FrameInput, JointName, JointSet, OverlayColor,
    PossessionState, SessionPhase, Verdict,
};
use std::sync::Arc;

fn wrist(x: f64, y: f64) -> JointSet {
    let mut joints = JointSet::new();
    joints.insert(JointName::RightWrist, Point::new(x, y), 0.9);
    joints
}

fn basketball(x: f64, y: f64) -> DetectedObject {
    DetectedObject::new("basketball", BoundingBox::new(x, y, 0.2, 0.2), 0.85)
}

#[test]
fn test_detector_space_right_angle_elbow_passes() {
    // detector-space points, flipped on the way in
    let joints = JointSet::from_detector([
        (JointName::RightShoulder, 0.0, 0.0, 0.9),
        (JointName::RightElbow, 0.0, -1.0, 0.9),
        (JointName::RightWrist, 1.0, -1.0, 0.9),
    ]);
    let assessment = Engine::default().evaluate(Some(&joints));
    let elbow = assessment.region(BodyRegion::Elbow).unwrap();
    assert_eq!(elbow.finding, Finding::Good);
}

#[test]
fn test_missing_arm_reports_unclear_and_fails() {
    let mut joints = JointSet::new();
    joints.insert(JointName::RightHip, Point::new(0.5, 0.6), 0.9);
    let assessment = Engine::default().evaluate(Some(&joints));

    assert_eq!(assessment.lines()[0], POSE_UNCLEAR);
    assert_eq!(assessment.verdict, Verdict::NeedsCorrection);
    assert_ne!(assessment.overlay, OverlayColor::Neutral);
}

#[test]
fn test_possession_outcomes() {
    let engine = Engine::default();
    let joints = wrist(0.5, 0.5);

    assert_eq!(
        engine.classify_possession(Some(&joints), &[basketball(0.4, 0.4)]),
        PossessionState::InHand
    );
    assert_eq!(
        engine.classify_possession(Some(&joints), &[basketball(0.0, 0.0)]),
        PossessionState::Released
    );
    assert_eq!(
        engine.classify_possession(Some(&joints), &[]),
        PossessionState::Undetermined
    );
}

#[test]
fn test_five_frames_capture_once_on_first_in_hand() {
    let engine = Engine::default();
    let session = engine.start_session();
    let in_hand = [false, true, false, true, false];

    let mut captured_on = Vec::new();
    for (i, held) in in_hand.iter().enumerate() {
        let frame_no = i as u64 + 1;
        let ball = if *held { basketball(0.4, 0.4) } else { basketball(0.0, 0.0) };
        let input = FrameInput::new(frame_no, Some(wrist(0.5, 0.5)), vec![ball]);
        if let Some(event) = engine.on_frame(&input, &session, frame_no).capture {
            captured_on.push(event.frame);
        }
    }

    assert_eq!(captured_on, vec![2]);
    assert_eq!(session.phase(), SessionPhase::Captured);
    assert_eq!(session.capture_count(), 1);
}

#[test]
fn test_reset_allows_new_capture() {
    let engine = Engine::default();
    let session = engine.start_session();
    let input = FrameInput::new(1, Some(wrist(0.5, 0.5)), vec![basketball(0.4, 0.4)]);

    assert!(engine.on_frame(&input, &session, "first").capture.is_some());
    assert!(engine.on_frame(&input, &session, "again").capture.is_none());

    engine.reset_session(&session);
    let event = engine.on_frame(&input, &session, "second").capture;
    assert_eq!(event.map(|e| e.frame), Some("second"));
    assert_eq!(session.captured_frames().len(), 1);
}

#[test]
fn test_concurrent_delivery_captures_once() {
    let engine = Arc::new(Engine::default());
    let session = Arc::new(engine.start_session::<u64>());

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                let input = FrameInput::new(i, Some(wrist(0.5, 0.5)), vec![basketball(0.4, 0.4)]);
                engine.on_frame(&input, &session, i).capture.is_some()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(wins, 1);
}

#[test]
fn test_angle_properties() {
    let a = Point::new(0.2, 0.7);
    let b = Point::new(0.5, 0.5);
    let c = Point::new(0.9, 0.6);
    let angle = angle_degrees(&a, &b, &c);
    assert_eq!(angle, angle_degrees(&c, &b, &a));
    assert!((0.0..=180.0).contains(&angle));
    assert_eq!(angle_degrees(&b, &b, &c), 0.0);
}

#[test]
fn test_replayed_feed_end_to_end() {
    let feed = r#"
{"index":0,"timestamp":0.0,"joints":null}
{"index":1,"timestamp":0.1,"joints":[{"name":"right_wrist","x":0.5,"y":0.5,"confidence":0.9}],"detections":[{"label":"basketball","x":0.8,"y":0.8,"width":0.1,"height":0.1,"confidence":0.9}]}
{"index":2,"timestamp":0.2,"joints":[{"name":"right_wrist","x":0.5,"y":0.5,"confidence":0.9}],"detections":[{"label":"basketball","x":0.45,"y":0.45,"width":0.1,"height":0.1,"confidence":0.9}]}
{"index":3,"timestamp":0.3,"error":"camera dropped frame"}
"#;
    let engine = Engine::default();
    let session = engine.start_session();

    let outcomes: Vec<_> = FeedReader::from_content(feed)
        .unwrap()
        .map(|f| engine.on_frame(&f.input, &session, f.frame))
        .collect();

    assert_eq!(outcomes[0].assessment.overlay, OverlayColor::Neutral);
    assert_eq!(outcomes[1].possession, PossessionState::Released);
    assert_eq!(outcomes[2].possession, PossessionState::InHand);
    assert_eq!(outcomes[2].capture.as_ref().map(|c| c.frame.index), Some(2));
    assert_eq!(outcomes[3].possession, PossessionState::Undetermined);
    assert!(outcomes[3].capture.is_none());
}
