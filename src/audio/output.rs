//! Sound device side of the voice pipeline
//!
//! The player worker owns exactly one [`AudioOutput`] and drives it from its
//! own thread: `play` starts a clip, `is_busy` is polled until the clip is
//! done, `stop` cuts it short.

use std::time::{Duration, Instant};

use super::backend::ReadyAudio;
use super::AudioError;

/// Device that plays one clip at a time
pub trait AudioOutput: Send {
    /// Start playing `audio`, replacing anything still playing
    fn play(&mut self, audio: ReadyAudio) -> Result<(), AudioError>;
    /// Whether the last clip is still playing
    fn is_busy(&self) -> bool;
    fn stop(&mut self);
}

/// Output without a device: a clip is "playing" for its duration hint
#[derive(Debug, Clone)]
pub struct NullOutput {
    until: Option<Instant>,
    fallback: Duration,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::with_fallback(Duration::ZERO)
    }

    /// Clips without a duration hint last `fallback`
    pub fn with_fallback(fallback: Duration) -> Self {
        Self {
            until: None,
            fallback,
        }
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn play(&mut self, audio: ReadyAudio) -> Result<(), AudioError> {
        let duration = audio.duration_hint.unwrap_or(self.fallback);
        self.until = Some(Instant::now() + duration);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.until.is_some_and(|until| Instant::now() < until)
    }

    fn stop(&mut self) {
        self.until = None;
    }
}

#[cfg(feature = "playback")]
pub use rodio_output::RodioOutput;

#[cfg(feature = "playback")]
mod rodio_output {
    //! rodio output on a dedicated thread, since `OutputStream` is not Send

    use std::io::Cursor;
    use std::time::Duration;

    use crossbeam::channel::{self, Receiver, Sender};
    use rodio::source::Zero;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use super::{AudioOutput, ReadyAudio};
    use crate::audio::AudioError;
    use crate::threading::Thread;

    const SILENCE_RATE: u32 = 22050;
    const BUSY_QUERY_TIMEOUT: Duration = Duration::from_millis(100);

    enum OutputCmd {
        Play(ReadyAudio),
        Stop,
        IsBusy(Sender<bool>),
        Shutdown,
    }

    pub struct RodioOutput {
        commands: Sender<OutputCmd>,
        thread: Option<Thread<()>>,
    }

    impl RodioOutput {
        /// Open the default device at `volume` (0.0 - 1.0)
        ///
        /// # Errors
        /// Returns `AudioError::Output` when no device can be opened
        pub fn open(volume: f32) -> Result<Self, AudioError> {
            let (tx, rx) = channel::unbounded();
            let (ready_tx, ready_rx) = channel::bounded(1);
            let thread = Thread::spawn("voice-output", move || {
                output_thread_main(rx, ready_tx, volume)
            })?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Self {
                    commands: tx,
                    thread: Some(thread),
                }),
                Ok(Err(reason)) => {
                    let _ = thread.join();
                    Err(AudioError::Output(reason))
                }
                Err(_) => Err(AudioError::Output("output thread exited".to_string())),
            }
        }
    }

    impl AudioOutput for RodioOutput {
        fn play(&mut self, audio: ReadyAudio) -> Result<(), AudioError> {
            self.commands
                .send(OutputCmd::Play(audio))
                .map_err(|_| AudioError::Output("output thread exited".to_string()))
        }

        fn is_busy(&self) -> bool {
            let (tx, rx) = channel::bounded(1);
            if self.commands.send(OutputCmd::IsBusy(tx)).is_err() {
                return false;
            }
            rx.recv_timeout(BUSY_QUERY_TIMEOUT).unwrap_or(false)
        }

        fn stop(&mut self) {
            let _ = self.commands.send(OutputCmd::Stop);
        }
    }

    impl Drop for RodioOutput {
        fn drop(&mut self) {
            let _ = self.commands.send(OutputCmd::Shutdown);
            if let Some(thread) = self.thread.take() {
                if let Err(err) = thread.join() {
                    log::warn!("voice output: {}", err);
                }
            }
        }
    }

    fn output_thread_main(
        rx: Receiver<OutputCmd>,
        ready: Sender<Result<(), String>>,
        volume: f32,
    ) {
        let (_stream, handle) = match OutputStream::try_default() {
            Ok(s) => s,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        let _ = ready.send(Ok(()));
        log::debug!("voice output opened");

        let mut sink: Option<Sink> = None;
        for cmd in rx.iter() {
            match cmd {
                OutputCmd::Play(audio) => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    match play_clip(&handle, audio, volume) {
                        Ok(s) => sink = Some(s),
                        Err(e) => log::warn!("voice output: {}", e),
                    }
                }
                OutputCmd::Stop => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                }
                OutputCmd::IsBusy(response) => {
                    let _ = response.send(sink.as_ref().is_some_and(|s| !s.empty()));
                }
                OutputCmd::Shutdown => break,
            }
        }
        log::debug!("voice output closed");
    }

    fn play_clip(
        handle: &OutputStreamHandle,
        audio: ReadyAudio,
        volume: f32,
    ) -> Result<Sink, AudioError> {
        let sink = Sink::try_new(handle).map_err(|e| AudioError::Playback(e.to_string()))?;
        sink.set_volume(volume);

        if audio.bytes.is_empty() {
            let duration = audio.duration_hint.unwrap_or_default();
            sink.append(Zero::<f32>::new(1, SILENCE_RATE).take_duration(duration));
        } else {
            let source = Decoder::new(Cursor::new(audio.bytes))
                .map_err(|e| AudioError::Playback(e.to_string()))?;
            sink.append(source);
        }
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_null_output_is_busy_for_the_hint() {
        let mut output = NullOutput::new();
        assert!(!output.is_busy());

        output
            .play(ReadyAudio::silence(Duration::from_millis(40)))
            .unwrap();
        assert!(output.is_busy());
        thread::sleep(Duration::from_millis(60));
        assert!(!output.is_busy());
    }

    #[test]
    fn test_null_output_stop() {
        let mut output = NullOutput::with_fallback(Duration::from_secs(10));
        output
            .play(ReadyAudio {
                bytes: vec![1, 2, 3],
                duration_hint: None,
            })
            .unwrap();
        assert!(output.is_busy());
        output.stop();
        assert!(!output.is_busy());
    }
}
