// src/capture.rs - Release-moment capture arbitration
use crate::possession::PossessionState;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

const PHASE_BITS: u64 = 2;
const PHASE_MASK: u64 = (1 << PHASE_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    /// Not recording.
    Idle,
    /// Recording, waiting for the first in-hand frame.
    Armed,
    /// This attempt's snapshot has been taken.
    Captured,
}

impl SessionPhase {
    fn bits(self) -> u64 {
        match self {
            SessionPhase::Idle => 0,
            SessionPhase::Armed => 1,
            SessionPhase::Captured => 2,
        }
    }

    fn from_bits(bits: u64) -> Self {
        match bits & PHASE_MASK {
            1 => SessionPhase::Armed,
            2 => SessionPhase::Captured,
            _ => SessionPhase::Idle,
        }
    }
}

fn pack(generation: u64, phase: SessionPhase) -> u64 {
    (generation << PHASE_BITS) | phase.bits()
}

fn unpack(word: u64) -> (u64, SessionPhase) {
    (word >> PHASE_BITS, SessionPhase::from_bits(word))
}

/// Instruction to persist the frame that was just flagged as the release moment.
#[derive(Debug, Clone)]
pub struct CaptureEvent<F> {
    pub id: Uuid,
    /// Recording attempt the capture belongs to.
    pub generation: u64,
    pub frame_index: u64,
    pub captured_at: DateTime<Local>,
    pub frame: F,
}

#[derive(Debug, Clone)]
pub struct CapturedFrame<F> {
    pub id: Uuid,
    pub generation: u64,
    pub frame_index: u64,
    pub captured_at: DateTime<Local>,
    pub frame: F,
}

/// Receives capture events without blocking the frame path.
pub trait CaptureSink<F> {
    fn deliver(&self, event: CaptureEvent<F>);
}

impl<F> CaptureSink<F> for tokio::sync::mpsc::UnboundedSender<CaptureEvent<F>> {
    fn deliver(&self, event: CaptureEvent<F>) {
        if self.send(event).is_err() {
            debug!("capture sink closed, dropping event");
        }
    }
}

/// One recording session's capture state plus the frames captured so far.
///
/// Hands out at most one capture per recording attempt. Phase and generation
/// share one atomic word so the Armed -> Captured step is a single
/// compare-and-set, even when frames arrive from several threads.
#[derive(Debug)]
pub struct CaptureSession<F> {
    state: AtomicU64,
    frames: Mutex<Vec<CapturedFrame<F>>>,
}

impl<F> Default for CaptureSession<F> {
    fn default() -> Self {
        Self {
            state: AtomicU64::new(pack(0, SessionPhase::Idle)),
            frames: Mutex::new(Vec::new()),
        }
    }
}

impl<F: Clone> CaptureSession<F> {
    /// A session that is not recording yet.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A session that is already recording.
    pub fn armed() -> Self {
        let session = Self::default();
        session.reset();
        session
    }

    pub fn phase(&self) -> SessionPhase {
        unpack(self.state.load(Ordering::Acquire)).1
    }

    pub fn generation(&self) -> u64 {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    /// Whether an event from `generation` still belongs to the live attempt.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Starts a new attempt: clears earlier captures and re-arms.
    pub fn reset(&self) {
        let mut frames = self.lock_frames();
        frames.clear();
        let previous = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let (generation, _) = unpack(word);
                Some(pack(generation + 1, SessionPhase::Armed))
            })
            .unwrap_or_else(|word| word);
        let (generation, _) = unpack(previous);
        info!(generation = generation + 1, "capture session armed");
    }

    /// Stops recording. Captured frames are kept for review, and a session
    /// that already captured stays captured.
    pub fn stop(&self) -> SessionPhase {
        let word = self.state.load(Ordering::Acquire);
        let (generation, phase) = unpack(word);
        if phase != SessionPhase::Armed {
            return phase;
        }
        match self.state.compare_exchange(
            word,
            pack(generation, SessionPhase::Idle),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!(generation, "capture session stopped without a capture");
                SessionPhase::Idle
            }
            Err(current) => unpack(current).1,
        }
    }

    /// Takes the snapshot for the first in-hand frame of an armed session.
    ///
    /// Returns `None` for every other frame, including in-hand frames after
    /// the capture and frames whose capture was overtaken by a reset.
    pub fn arbitrate(
        &self,
        possession: PossessionState,
        frame_index: u64,
        frame: F,
    ) -> Option<CaptureEvent<F>> {
        if possession != PossessionState::InHand {
            return None;
        }

        let word = self.state.load(Ordering::Acquire);
        let (generation, phase) = unpack(word);
        if phase != SessionPhase::Armed {
            return None;
        }

        self.state
            .compare_exchange(
                word,
                pack(generation, SessionPhase::Captured),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        let mut frames = self.lock_frames();
        if !self.is_current(generation) {
            debug!(generation, frame_index, "capture discarded by reset");
            return None;
        }

        let event = CaptureEvent {
            id: Uuid::new_v4(),
            generation,
            frame_index,
            captured_at: Local::now(),
            frame,
        };
        frames.push(CapturedFrame {
            id: event.id,
            generation,
            frame_index,
            captured_at: event.captured_at,
            frame: event.frame.clone(),
        });

        info!(generation, frame_index, id = %event.id, "release moment captured");
        Some(event)
    }

    pub fn captured_frames(&self) -> Vec<CapturedFrame<F>> {
        self.lock_frames().clone()
    }

    pub fn capture_count(&self) -> usize {
        self.lock_frames().len()
    }

    fn lock_frames(&self) -> MutexGuard<'_, Vec<CapturedFrame<F>>> {
        // a panic elsewhere cannot leave the Vec half-written
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    const IN: PossessionState = PossessionState::InHand;
    const OUT: PossessionState = PossessionState::Released;

    #[test]
    fn test_idle_session_never_captures() {
        let session: CaptureSession<u32> = CaptureSession::idle();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.arbitrate(IN, 0, 7).is_none());
        assert_eq!(session.capture_count(), 0);
    }

    #[test]
    fn test_first_in_hand_frame_only() {
        let session = CaptureSession::armed();
        let sequence = [OUT, IN, OUT, IN, PossessionState::Undetermined];

        let fired: Vec<u64> = sequence
            .iter()
            .enumerate()
            .filter_map(|(i, p)| session.arbitrate(*p, i as u64 + 1, i as u32 + 1))
            .map(|event| event.frame_index)
            .collect();

        assert_eq!(fired, vec![2]);
        assert_eq!(session.phase(), SessionPhase::Captured);
        let frames = session.captured_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame, 2);
    }

    #[test]
    fn test_reset_rearms_and_clears() {
        let session = CaptureSession::armed();
        let first = session.arbitrate(IN, 1, "a").unwrap();
        assert!(session.arbitrate(IN, 2, "b").is_none());

        session.reset();
        assert_eq!(session.phase(), SessionPhase::Armed);
        assert_eq!(session.capture_count(), 0);
        assert!(!session.is_current(first.generation));

        let second = session.arbitrate(IN, 3, "c").unwrap();
        assert_eq!(second.frame, "c");
        assert_eq!(second.generation, first.generation + 1);
        assert_eq!(session.captured_frames()[0].frame, "c");
    }

    #[test]
    fn test_stop_keeps_captures() {
        let session = CaptureSession::armed();
        session.arbitrate(IN, 1, 10u8).unwrap();
        assert_eq!(session.stop(), SessionPhase::Captured);
        assert_eq!(session.capture_count(), 1);

        let unlucky: CaptureSession<u8> = CaptureSession::armed();
        assert_eq!(unlucky.stop(), SessionPhase::Idle);
        assert!(unlucky.arbitrate(IN, 2, 11).is_none());
    }

    #[test]
    fn test_concurrent_frames_capture_once() {
        let session = Arc::new(CaptureSession::<usize>::armed());
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    session.arbitrate(IN, i as u64, i).is_some()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(session.capture_count(), 1);
    }

    #[test]
    fn test_reset_racing_captures_keeps_one_current_frame() {
        let session = Arc::new(CaptureSession::<u64>::armed());
        let workers = 8;

        for round in 0..200u64 {
            session.reset();
            let barrier = Arc::new(Barrier::new(workers + 1));

            let resetter = {
                let session = Arc::clone(&session);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    session.reset();
                })
            };
            let handles: Vec<_> = (0..workers as u64)
                .map(|i| {
                    let session = Arc::clone(&session);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        session.arbitrate(IN, round * 100 + i, i)
                    })
                })
                .collect();

            resetter.join().unwrap();
            let events: Vec<_> = handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .collect();

            let current = session.generation();
            let frames = session.captured_frames();
            assert!(session.capture_count() <= 1, "round {}", round);
            assert!(frames.iter().all(|f| f.generation == current), "round {}", round);
            for generation in [current - 1, current] {
                let winners = events.iter().filter(|e| e.generation == generation).count();
                assert!(winners <= 1, "round {}", round);
            }
            if let Some(frame) = frames.first() {
                assert!(events.iter().any(|e| e.id == frame.id));
            }
        }
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<CaptureEvent<char>>();
        let session = CaptureSession::armed();
        let event = session.arbitrate(IN, 4, 'x').unwrap();
        tx.deliver(event);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.frame_index, 4);
        assert_eq!(received.frame, 'x');
    }
}
