//! Text → speech → playback pipeline
//!
//! Two workers share a bounded task channel and a lock-guarded ready list:
//!
//! ```text
//! speak() ──► [task channel] ──► synthesizer ──► [ready list] ──► player ──► AudioOutput
//! ```
//!
//! The synthesizer handles one task at a time, so the ready list fills in
//! submission order however long each synthesis takes; the player pops the
//! oldest entry and plays it to completion before taking the next.
//!
//! # Design Notes
//!
//! - `stop_all` bumps a generation counter, then clears the pending tasks
//!   and the ready list. Work tagged with an older generation is dropped
//!   wherever it is found, and the player cuts its current clip when it
//!   notices the bump.
//! - Auth and quota failures switch the pipeline off and leave exactly one
//!   notice for the owner to collect with `pop_notice`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::backend::{AudioTask, ReadyAudio, SpeechBackend};
use super::output::AudioOutput;
use super::AudioError;
use crate::threading::{hibernate_thread, StopSignal, Thread};

/// Default number of utterances waiting for synthesis
pub const DEFAULT_TASK_CAPACITY: usize = 32;

/// Poll interval while a clip is playing
const BUSY_POLL: Duration = Duration::from_millis(10);

/// Sleep when nothing is ready to play
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// State shared by the owner and both workers
struct Shared {
    ready: Mutex<VecDeque<(u64, ReadyAudio)>>,
    pending: Receiver<AudioTask>,
    enabled: AtomicBool,
    generation: AtomicU64,
    notice: Mutex<Option<String>>,
    stop: StopSignal,
}

impl Shared {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn stop_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let dropped = self.pending.try_iter().count();
        let mut ready = self.ready.lock();
        if dropped > 0 || !ready.is_empty() {
            log::debug!(
                "voice: dropped {} pending and {} ready utterances",
                dropped,
                ready.len()
            );
        }
        ready.clear();
    }

    fn disable(&self) -> bool {
        let was_enabled = self.enabled.swap(false, Ordering::AcqRel);
        self.stop_all();
        was_enabled
    }
}

/// Voice pipeline with an explicit start/shutdown lifecycle
pub struct AudioPipeline {
    shared: Arc<Shared>,
    tasks: Mutex<Option<Sender<AudioTask>>>,
    synthesizer: Mutex<Option<Thread<()>>>,
    player: Mutex<Option<Thread<()>>>,
}

impl AudioPipeline {
    /// Spawn the synthesizer and player workers
    ///
    /// # Errors
    /// Returns `AudioError::Spawn` if either worker cannot be started
    pub fn start(
        backend: Arc<dyn SpeechBackend>,
        output: Box<dyn AudioOutput>,
        capacity: usize,
    ) -> Result<Self, AudioError> {
        let (task_tx, task_rx) = channel::bounded::<AudioTask>(capacity.max(1));
        let shared = Arc::new(Shared {
            ready: Mutex::new(VecDeque::new()),
            pending: task_rx.clone(),
            enabled: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            notice: Mutex::new(None),
            stop: StopSignal::new(),
        });

        let synth_shared = Arc::clone(&shared);
        let synthesizer = Thread::spawn("voice-synthesizer", move || {
            synthesizer_main(task_rx, backend, synth_shared)
        })?;

        let player_shared = Arc::clone(&shared);
        let player = match Thread::spawn("voice-player", move || {
            player_main(output, player_shared)
        }) {
            Ok(player) => player,
            Err(err) => {
                shared.stop.stop();
                drop(task_tx);
                if let Err(join_err) = synthesizer.join() {
                    log::warn!("voice pipeline: {}", join_err);
                }
                return Err(err.into());
            }
        };

        Ok(Self {
            shared,
            tasks: Mutex::new(Some(task_tx)),
            synthesizer: Mutex::new(Some(synthesizer)),
            player: Mutex::new(Some(player)),
        })
    }

    /// Queue a line for speech
    ///
    /// Returns false when the pipeline is disabled, shut down, or its task
    /// queue is full (the line is then simply not spoken).
    pub fn speak(&self, text: &str, voice: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let task = AudioTask {
            text: text.to_string(),
            voice: voice.to_string(),
            generation: self.shared.generation(),
        };

        let tasks = self.tasks.lock();
        let Some(tx) = tasks.as_ref() else {
            return false;
        };
        match tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                log::warn!("voice queue full, not speaking: {}", task.text);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Stop playback and forget everything queued. Idempotent.
    pub fn stop_all(&self) {
        self.shared.stop_all();
    }

    /// Switch speech off until [`AudioPipeline::enable`]
    pub fn disable(&self) {
        self.shared.disable();
    }

    pub fn enable(&self) {
        self.shared.enabled.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Take the pending user-facing notice, if any
    pub fn pop_notice(&self) -> Option<String> {
        self.shared.notice.lock().take()
    }

    /// Utterances synthesized but not yet played
    pub fn ready_len(&self) -> usize {
        self.shared.ready.lock().len()
    }

    /// Stop both workers and wait for them. Idempotent.
    pub fn shutdown(&self) {
        self.shared.stop.stop();
        self.tasks.lock().take();
        self.shared.stop_all();

        for slot in [&self.synthesizer, &self.player] {
            if let Some(worker) = slot.lock().take() {
                if let Err(err) = worker.join() {
                    log::warn!("voice pipeline: {}", err);
                }
            }
        }
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn synthesizer_main(tasks: Receiver<AudioTask>, backend: Arc<dyn SpeechBackend>, shared: Arc<Shared>) {
    for task in tasks.iter() {
        if shared.stop.is_stopped() {
            break;
        }
        if task.generation != shared.generation() || !shared.enabled.load(Ordering::Acquire) {
            continue;
        }

        match backend.synthesize(&task.text, &task.voice) {
            Ok(audio) => {
                let mut ready = shared.ready.lock();
                if task.generation == shared.generation() {
                    ready.push_back((task.generation, audio));
                }
            }
            Err(err) if err.is_fatal() => {
                log::warn!("voice disabled: {}", err);
                if shared.disable() {
                    *shared.notice.lock() = Some(err.notice());
                }
            }
            Err(err) => {
                log::warn!("voice dropped: {}", err);
            }
        }
    }
    log::debug!("voice synthesizer exiting");
}

fn player_main(mut output: Box<dyn AudioOutput>, shared: Arc<Shared>) {
    while !shared.stop.is_stopped() {
        let next = shared.ready.lock().pop_front();
        let Some((generation, audio)) = next else {
            hibernate_thread(IDLE_SLEEP);
            continue;
        };
        if generation != shared.generation() {
            continue;
        }

        if let Err(err) = output.play(audio) {
            log::warn!("voice playback failed: {}", err);
            continue;
        }
        while output.is_busy() {
            if shared.stop.is_stopped() || shared.generation() != generation {
                output.stop();
                break;
            }
            hibernate_thread(BUSY_POLL);
        }
    }
    output.stop();
    log::debug!("voice player exiting");
}
