// src/main.rs - Replay CLI
use anyhow::{Context, Result};
use clap::Parser;
use freethrow_coach::capture::{CaptureEvent, CaptureSession, CaptureSink, SessionPhase};
use freethrow_coach::config::CoachConfig;
use freethrow_coach::data::SessionExporter;
use freethrow_coach::engine::{Engine, FrameOutcome};
use freethrow_coach::feed::{FeedReader, FrameRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "freethrow-coach",
    about = "Replays recorded pose and ball detections through the free-throw form engine"
)]
struct Args {
    /// Recorded detector output, one JSON object per frame
    #[arg(long, short, value_name = "PATH")]
    input: PathBuf,

    /// JSON configuration file
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory receiving the session folder
    #[arg(long, short, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Session folder name (defaults to a timestamp)
    #[arg(long)]
    session: Option<String>,

    /// Write the effective configuration to PATH and exit
    #[arg(long, value_name = "PATH")]
    dump_config: Option<PathBuf>,
}

const PROGRESS_INTERVAL: usize = 30;

enum Presentation {
    Frame {
        outcome: FrameOutcome<FrameRef>,
        timestamp: f64,
    },
    RecordingStopped(SessionPhase),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freethrow_coach=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CoachConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => CoachConfig::default(),
    };
    if let Some(output) = &args.output {
        config.replay.output_directory = output.clone();
    }
    config.validate()?;

    if let Some(path) = &args.dump_config {
        config.save(path)?;
        info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let reader = FeedReader::open(&args.input)
        .with_context(|| format!("Failed to read feed: {}", args.input.display()))?;
    let feed_dir = args
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    info!(
        side = ?config.engine.shooting_side,
        elbow = ?config.engine.elbow_band,
        knee = ?config.engine.knee_band,
        window_secs = config.replay.recording_window_secs,
        "starting replay"
    );

    let engine = Arc::new(Engine::new(&config.engine));
    let session: Arc<CaptureSession<FrameRef>> = Arc::new(engine.start_session());
    let mut exporter = SessionExporter::new(&config.replay.output_directory, args.session.clone());

    let (frame_tx, mut frame_rx) = mpsc::channel::<Presentation>(64);
    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel::<CaptureEvent<FrameRef>>();

    let delivery = {
        let engine = Arc::clone(&engine);
        let session = Arc::clone(&session);
        let window = config.replay.recording_window_secs;
        tokio::spawn(async move {
            deliver_frames(reader, feed_dir, engine, session, window, frame_tx, capture_tx).await
        })
    };

    // Single consumer: feedback display and persistence are serialized here.
    let mut frames_open = true;
    let mut captures_open = true;
    while frames_open || captures_open {
        tokio::select! {
            message = frame_rx.recv(), if frames_open => match message {
                Some(Presentation::Frame { outcome, timestamp }) => {
                    present(&outcome);
                    exporter.add_frame(&outcome, timestamp);
                }
                Some(Presentation::RecordingStopped(phase)) => {
                    info!(?phase, "recording window closed");
                }
                None => frames_open = false,
            },
            event = capture_rx.recv(), if captures_open => match event {
                Some(event) if session.is_current(event.generation) => {
                    if let Err(e) = exporter.export_capture(&event) {
                        error!("Failed to export capture: {:#}", e);
                    }
                }
                Some(event) => debug!(generation = event.generation, "stale capture skipped"),
                None => captures_open = false,
            },
        }
    }

    let delivered = delivery.await.context("frame delivery task panicked")?;
    info!(frames = delivered, captures = session.capture_count(), "replay finished");

    if config.replay.export_csv {
        let path = exporter.export_csv()?;
        info!(path = %path.display(), "analysis exported");
    }
    if config.replay.generate_report {
        let path = exporter.generate_report()?;
        info!(path = %path.display(), "report generated");
    }

    match exporter.captures().first() {
        Some(capture) => info!(
            frame = capture.frame_index,
            path = %capture.path.display(),
            "release moment ready for review"
        ),
        None => warn!("no release moment captured this session"),
    }

    Ok(())
}

/// Frame-delivery path: runs the engine and hands results to the presenter.
async fn deliver_frames(
    mut reader: FeedReader,
    feed_dir: PathBuf,
    engine: Arc<Engine>,
    session: Arc<CaptureSession<FrameRef>>,
    window_secs: f64,
    frames: mpsc::Sender<Presentation>,
    captures: mpsc::UnboundedSender<CaptureEvent<FrameRef>>,
) -> usize {
    let mut started_at: Option<f64> = None;
    let mut recording = true;
    let mut delivered = 0;

    while let Some(mut feed_frame) = reader.next_frame() {
        let timestamp = feed_frame.frame.timestamp;
        let start = *started_at.get_or_insert(timestamp);

        if recording && timestamp - start >= window_secs {
            recording = false;
            let phase = engine.stop_session(&session);
            if frames.send(Presentation::RecordingStopped(phase)).await.is_err() {
                break;
            }
        }

        if let Some(image) = feed_frame.frame.image.take() {
            feed_frame.frame.image = Some(if image.is_relative() {
                feed_dir.join(image)
            } else {
                image
            });
        }

        let outcome = engine.on_frame(&feed_frame.input, &session, feed_frame.frame);
        if let Some(event) = &outcome.capture {
            captures.deliver(event.clone());
        }

        delivered += 1;
        if delivered % PROGRESS_INTERVAL == 0 {
            debug!(frames = delivered, progress = reader.get_progress(), "replaying");
        }
        if frames
            .send(Presentation::Frame { outcome, timestamp })
            .await
            .is_err()
        {
            break;
        }
    }

    delivered
}

fn present(outcome: &FrameOutcome<FrameRef>) {
    let assessment = &outcome.assessment;
    info!(
        frame = outcome.frame_index,
        overlay = ?assessment.overlay,
        ball = %outcome.possession,
        "{}",
        assessment.headline()
    );
    for line in assessment.lines() {
        debug!(frame = outcome.frame_index, "  {}", line);
    }
}
