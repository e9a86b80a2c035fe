//! Shared test doubles wired through the engine's trait seams.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::assets::{LanguageAssets, VoiceAssets};
use crate::audio::AudioBuffer;
use crate::error::{PlaybackError, SynthesisError};
use crate::language::Language;
use crate::model::{ModelLoader, VoiceModel};
use crate::playback::{PlaybackOutcome, Player};
use crate::session::EngineSession;

/// Create `model.onnx` + `tokens.txt` under `root` for each language.
pub fn installed_assets(root: &Path, langs: &[Language]) -> VoiceAssets {
    for lang in langs {
        let dir = root.join(lang.dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.onnx"), b"model").unwrap();
        std::fs::write(dir.join("tokens.txt"), b"tokens").unwrap();
    }
    VoiceAssets::new(root)
}

#[derive(Default)]
struct ModelFlags {
    empty_output: AtomicBool,
    synth_fail: AtomicBool,
    synth_delay_ms: AtomicU64,
}

/// Counting loader whose models obey the configured knobs.
#[derive(Default)]
pub struct FakeLoader {
    flags: Arc<ModelFlags>,
    loads: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeLoader {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn fail_next_load(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn set_empty_output(&self, on: bool) {
        self.flags.empty_output.store(on, Ordering::SeqCst);
    }

    pub fn set_synth_fail(&self, on: bool) {
        self.flags.synth_fail.store(on, Ordering::SeqCst);
    }

    pub fn set_synth_delay(&self, delay: Duration) {
        self.flags
            .synth_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl ModelLoader for FakeLoader {
    fn load(
        &self,
        _lang: Language,
        _assets: &LanguageAssets,
    ) -> Result<Arc<dyn VoiceModel>, SynthesisError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SynthesisError::Load("forced load failure".into()));
        }
        Ok(Arc::new(FakeModel {
            flags: Arc::clone(&self.flags),
        }))
    }
}

struct FakeModel {
    flags: Arc<ModelFlags>,
}

impl VoiceModel for FakeModel {
    fn synthesize(&self, _text: &str) -> Result<AudioBuffer, SynthesisError> {
        let delay = self.flags.synth_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.flags.synth_fail.load(Ordering::SeqCst) {
            return Err(SynthesisError::Engine("forced synthesis failure".into()));
        }
        if self.flags.empty_output.load(Ordering::SeqCst) {
            return Ok(AudioBuffer {
                samples: Vec::new(),
                sample_rate: 16000,
            });
        }
        Ok(AudioBuffer {
            samples: vec![100; 160],
            sample_rate: 16000,
        })
    }
}

/// Player that "plays" for a fixed wall-clock duration and follows the
/// latched-stop discipline. `play_count` counts cycles where audio
/// actually started.
pub struct FakePlayer {
    stopped: AtomicBool,
    play_ms: u64,
    fail: AtomicBool,
    plays: Mutex<Vec<PathBuf>>,
    on_play: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl FakePlayer {
    pub fn new(play_ms: u64) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            play_ms,
            fail: AtomicBool::new(false),
            plays: Mutex::new(Vec::new()),
            on_play: Mutex::new(None),
        }
    }

    pub fn set_fail(&self, on: bool) {
        self.fail.store(on, Ordering::SeqCst);
    }

    /// Run `hook` at the start of every play call, ahead of the
    /// latched-stop check. Lets a test land a stop exactly at the
    /// playback handoff.
    pub fn set_on_play(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_play.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }
}

impl Player for FakePlayer {
    fn play(&self, path: &Path) -> Result<PlaybackOutcome, PlaybackError> {
        if let Some(hook) = self.on_play.lock().unwrap().as_ref() {
            hook();
        }
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(PlaybackOutcome::Stopped);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Output("forced playback failure".into()));
        }
        self.plays.lock().unwrap().push(path.to_path_buf());
        let deadline = Instant::now() + Duration::from_millis(self.play_ms);
        while Instant::now() < deadline {
            if self.stopped.load(Ordering::SeqCst) {
                return Ok(PlaybackOutcome::Stopped);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        Ok(PlaybackOutcome::Completed)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

/// Session over fake backends with assets installed for `langs`.
pub fn fake_session(
    root: &Path,
    langs: &[Language],
    loader: Arc<FakeLoader>,
    player: Arc<FakePlayer>,
) -> EngineSession {
    let assets = installed_assets(root, langs);
    EngineSession::new(assets, loader, player, root.join("scratch"))
}
