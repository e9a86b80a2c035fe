//! Audio playback with interruption support.
//!
//! The engine session hands playback a scratch WAV path and blocks its
//! worker until the audio drains or `stop` takes the sink away. At most
//! one output resource is held at a time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tracing::debug;

use crate::error::PlaybackError;

/// How a `play` call ended. Exactly one outcome per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Stopped,
}

/// Drives audio output for the engine session.
///
/// Stop discipline: a stop is latched until the next `reset`, and `play`
/// refuses to start while one is latched. The session resets once per
/// speak cycle, so a stop landing anywhere between that reset and the
/// end of playback is honored.
pub trait Player: Send + Sync {
    /// Play the file to the end, blocking the calling thread. Releases
    /// any previously held output resource first. Returns `Stopped`
    /// without starting audio when a stop is already latched.
    fn play(&self, path: &Path) -> Result<PlaybackOutcome, PlaybackError>;

    /// Halt and release the active output, if any, and latch the stop.
    /// Idempotent; valid while nothing is playing.
    fn stop(&self);

    /// Clear a latched stop. Called once at speak-cycle start, before
    /// synthesis begins.
    fn reset(&self);
}

/// rodio-backed player. The output stream stays open for the process
/// lifetime; each play cycle gets a fresh sink.
pub struct RodioPlayer {
    stream: OutputStream,
    active: Mutex<Option<Sink>>,
    stopped: AtomicBool,
}

impl RodioPlayer {
    pub fn new() -> Result<Self, PlaybackError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        Ok(Self {
            stream,
            active: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }
}

impl Player for RodioPlayer {
    fn play(&self, path: &Path) -> Result<PlaybackOutcome, PlaybackError> {
        // Release whatever the previous cycle left behind.
        if let Some(old) = self.active.lock().unwrap().take() {
            old.stop();
        }
        // A stop latched since the cycle's reset wins before any audio
        // starts.
        if self.stopped.load(Ordering::SeqCst) {
            debug!(path = %path.display(), "playback suppressed by pending stop");
            return Ok(PlaybackOutcome::Stopped);
        }

        let file = File::open(path).map_err(|e| PlaybackError::Io(e.to_string()))?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| PlaybackError::Decode(e.to_string()))?;
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(source);
        *self.active.lock().unwrap() = Some(sink);

        // Poll until the sink drains or stop() intervenes. The flag is
        // checked first so a stop that raced the sink install is still
        // caught on the next tick; a natural drain is a completion no
        // matter what arrives afterwards.
        let outcome = loop {
            if self.stopped.load(Ordering::SeqCst) {
                if let Some(sink) = self.active.lock().unwrap().take() {
                    sink.stop();
                }
                break PlaybackOutcome::Stopped;
            }
            match self.active.lock().unwrap().as_ref() {
                Some(sink) if sink.empty() => break PlaybackOutcome::Completed,
                Some(_) => {}
                None => break PlaybackOutcome::Stopped,
            }
            std::thread::sleep(Duration::from_millis(50));
        };
        self.active.lock().unwrap().take();

        if outcome == PlaybackOutcome::Stopped {
            debug!(path = %path.display(), "playback interrupted");
        }
        Ok(outcome)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(sink) = self.active.lock().unwrap().take() {
            sink.stop();
        }
    }

    fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakePlayer;

    #[test]
    fn latched_stop_wins_before_audio_starts() {
        let player = FakePlayer::new(1_000);
        player.reset();
        player.stop();

        let outcome = player.play(Path::new("unused.wav")).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert_eq!(player.play_count(), 0);
    }

    #[test]
    fn stale_stop_is_cleared_by_the_next_cycle() {
        let player = FakePlayer::new(0);
        player.reset();
        assert_eq!(
            player.play(Path::new("unused.wav")).unwrap(),
            PlaybackOutcome::Completed
        );

        // A stop arriving after the cycle resolved stays latched only
        // until the next cycle's reset.
        player.stop();
        player.reset();
        assert_eq!(
            player.play(Path::new("unused.wav")).unwrap(),
            PlaybackOutcome::Completed
        );
        assert_eq!(player.play_count(), 2);
    }
}
