//! Paced delivery of dialogue lines
//!
//! The [`EventScheduler`] sits between whoever produces dialogue (a
//! streaming source pulled on demand, or a batch pushed in all at once) and
//! the consumer that displays it. Lines come out at most one per tick
//! interval, in production order, no matter how fast they went in.
//!
//! # Design Notes
//!
//! All state lives behind one `parking_lot::Mutex`. An attached stream is
//! taken out of the state before it is pulled so the lock is never held
//! across a (possibly slow) generation call; an epoch counter lets a
//! concurrent `reset()` or `attach_stream()` win over a pull in flight.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::dialogue::{DialogueLine, DialogueStream, StreamItem};

/// Default pause between two delivered lines
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1200);

/// Result of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tick {
    /// Line to display now, if one is due
    pub line: Option<DialogueLine>,
    /// The engine should move to the next phase
    pub advance: bool,
}

impl Tick {
    fn idle() -> Self {
        Self::default()
    }

    fn deliver(line: DialogueLine) -> Self {
        Self {
            line: Some(line),
            advance: false,
        }
    }
}

struct SchedulerState {
    queue: VecDeque<DialogueLine>,
    stream: Option<Box<dyn DialogueStream>>,
    production_done: bool,
    armed: bool,
    last_delivery: Option<Instant>,
    epoch: u64,
}

/// Timed FIFO of dialogue lines
pub struct EventScheduler {
    interval: Duration,
    state: Mutex<SchedulerState>,
}

impl EventScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(SchedulerState {
                queue: VecDeque::new(),
                stream: None,
                production_done: true,
                armed: false,
                last_delivery: None,
                epoch: 0,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Queue one line behind everything already queued
    pub fn push(&self, line: DialogueLine) {
        self.state.lock().queue.push_back(line);
    }

    /// Queue lines in order
    pub fn extend(&self, lines: impl IntoIterator<Item = DialogueLine>) {
        self.state.lock().queue.extend(lines);
    }

    /// Pull lines from `stream` once the queue runs dry
    ///
    /// Replaces any stream already attached.
    pub fn attach_stream(&self, stream: Box<dyn DialogueStream>) {
        let mut state = self.state.lock();
        state.stream = Some(stream);
        state.production_done = false;
        state.epoch += 1;
    }

    /// More lines are on their way (a batch job is running)
    pub fn begin_production(&self) {
        self.state.lock().production_done = false;
    }

    /// Nothing more will be pushed for the current phase
    pub fn finish_production(&self) {
        self.state.lock().production_done = true;
    }

    /// Report `advance` once the queue drains and production is done
    pub fn arm_auto_advance(&self) {
        self.state.lock().armed = true;
    }

    pub fn disarm(&self) {
        self.state.lock().armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    pub fn is_production_done(&self) -> bool {
        self.state.lock().production_done
    }

    pub fn has_stream(&self) -> bool {
        self.state.lock().stream.is_some()
    }

    /// Queued lines not yet delivered
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nothing queued, nothing attached, nothing pending
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.queue.is_empty() && state.stream.is_none() && state.production_done
    }

    /// Deliver at most one line, or the auto-advance signal
    pub fn tick(&self, now: Instant) -> Tick {
        let mut state = self.state.lock();
        if let Some(last) = state.last_delivery {
            if now.saturating_duration_since(last) < self.interval {
                return Tick::idle();
            }
        }

        if let Some(line) = state.queue.pop_front() {
            state.last_delivery = Some(now);
            return Tick::deliver(line);
        }

        if let Some(mut stream) = state.stream.take() {
            let epoch = state.epoch;
            drop(state);
            let item = stream.stream_next();
            state = self.state.lock();
            if state.epoch != epoch {
                return Tick::idle();
            }
            match item {
                StreamItem::Line(line) => {
                    state.stream = Some(stream);
                    state.last_delivery = Some(now);
                    return Tick::deliver(line);
                }
                StreamItem::End => {
                    state.production_done = true;
                }
            }
        }

        if state.production_done && state.armed {
            state.armed = false;
            return Tick {
                line: None,
                advance: true,
            };
        }
        Tick::idle()
    }

    /// Hand over every queued line now, then drain the attached stream
    pub fn flush(&self) -> Vec<DialogueLine> {
        let (mut lines, stream, epoch) = {
            let mut state = self.state.lock();
            let lines: Vec<DialogueLine> = state.queue.drain(..).collect();
            (lines, state.stream.take(), state.epoch)
        };

        if let Some(mut stream) = stream {
            while let StreamItem::Line(line) = stream.stream_next() {
                lines.push(line);
            }
            let mut state = self.state.lock();
            if state.epoch == epoch {
                state.production_done = true;
            }
        }
        lines
    }

    /// Drop everything queued and detach the stream
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.queue.clear();
        state.stream = None;
        state.production_done = true;
        state.armed = false;
        state.epoch += 1;
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}
