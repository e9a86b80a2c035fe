//! Engine session: the speaking guard and the speak/stop pipeline.
//!
//! State machine, two states: Idle and Speaking. `speak` flips
//! Idle→Speaking atomically or is rejected outright; Speaking→Idle on
//! playback completion, playback error, synthesis error, or `stop`.
//! Nothing queues, nothing preempts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task;
use tracing::{info, warn};

use crate::assets::VoiceAssets;
use crate::error::{EngineError, SynthesisError};
use crate::language::Language;
use crate::model::{ModelCache, ModelLoader};
use crate::playback::{PlaybackOutcome, Player};

/// Terminal acknowledgement strings delivered over IPC.
pub const DONE_RESULT: &str = "Done speaking.";
pub const STOPPED_RESULT: &str = "Stopped.";
pub const PONG_RESULT: &str = "pong";

/// Owns the model cache, the playback controller, and the single-flight
/// speaking guard. Cheap to clone; all clones share one guard.
#[derive(Clone)]
pub struct EngineSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    assets: VoiceAssets,
    cache: ModelCache,
    player: Arc<dyn Player>,
    scratch_dir: PathBuf,
    speaking: Arc<AtomicBool>,
    cancelled: AtomicBool,
}

impl EngineSession {
    pub fn new(
        assets: VoiceAssets,
        loader: Arc<dyn ModelLoader>,
        player: Arc<dyn Player>,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                assets,
                cache: ModelCache::new(loader),
                player,
                scratch_dir,
                speaking: Arc::new(AtomicBool::new(false)),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.speaking.load(Ordering::SeqCst)
    }

    /// Run one speak cycle to its terminal outcome and return the
    /// user-facing result text. The caller's task is never blocked: the
    /// model/synthesis/playback work runs on the blocking pool, and the
    /// guard stays held for the full synthesize+play span.
    pub async fn speak(&self, text: &str, lang: Language) -> Result<String, EngineError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            // Rejected before the guard or the cache is touched.
            return Err(EngineError::EmptyText);
        }

        let Some(ticket) = SpeakingTicket::acquire(&self.inner.speaking) else {
            warn!(lang = %lang, "already_speaking");
            return Err(EngineError::AlreadySpeaking);
        };
        // One cancel signal per cycle: both flags are cleared here and
        // only a stop() sets them again until the cycle resolves.
        self.inner.cancelled.store(false, Ordering::SeqCst);
        self.inner.player.reset();
        info!(lang = %lang, chars = text.len(), "speak_start");

        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let _ticket = ticket; // guard released when the cycle ends, success or not
            inner.run_cycle(&text, lang)
        })
        .await
        .map_err(|e| {
            EngineError::Synthesis(SynthesisError::Engine(format!("worker failed: {e}")))
        })?
    }

    /// Valid in any state. Idle: a no-op beyond releasing any retained
    /// playback resource. Speaking: halts playback, suppresses any audio
    /// the in-flight synthesis would produce, and lets the cycle resolve
    /// with the stopped acknowledgement instead of the normal completion.
    pub fn stop(&self) -> String {
        info!(speaking = self.is_speaking(), "stop");
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.player.stop();
        STOPPED_RESULT.to_string()
    }
}

impl SessionInner {
    /// The guarded body of one speak cycle. Runs on the blocking worker.
    fn run_cycle(&self, text: &str, lang: Language) -> Result<String, EngineError> {
        let Some(assets) = self.assets.resolve(lang) else {
            warn!(lang = %lang, "model_missing");
            return Err(EngineError::ModelMissing(lang));
        };

        let model = self.cache.get_or_create(lang, &assets).map_err(|e| {
            warn!(lang = %lang, error = %e, "synthesis_failed");
            EngineError::Synthesis(e)
        })?;

        let audio = model.synthesize(text).map_err(|e| {
            warn!(lang = %lang, error = %e, "synthesis_failed");
            EngineError::Synthesis(e)
        })?;
        if audio.is_empty() {
            warn!(lang = %lang, "synthesis_failed");
            return Err(EngineError::Synthesis(SynthesisError::EmptyOutput));
        }

        // A stop that landed during synthesis means no audio may be
        // played afterwards; the computation itself cannot be aborted.
        if self.cancelled.load(Ordering::SeqCst) {
            return Ok(STOPPED_RESULT.to_string());
        }

        std::fs::create_dir_all(&self.scratch_dir)
            .map_err(|e| EngineError::Playback(crate::error::PlaybackError::Io(e.to_string())))?;
        let scratch = self.scratch_dir.join(format!("{}.wav", lang.dir_name()));
        audio.write_wav(&scratch)?;

        // Last look before the handoff; the player itself refuses to
        // start when a stop lands even later than this.
        if self.cancelled.load(Ordering::SeqCst) {
            return Ok(STOPPED_RESULT.to_string());
        }

        info!(
            lang = %lang,
            path = %scratch.display(),
            duration_secs = audio.duration_secs(),
            "playback_started"
        );
        match self.player.play(&scratch) {
            Ok(PlaybackOutcome::Completed) => {
                info!(lang = %lang, "playback_completed");
                Ok(DONE_RESULT.to_string())
            }
            Ok(PlaybackOutcome::Stopped) => Ok(STOPPED_RESULT.to_string()),
            Err(e) => {
                warn!(lang = %lang, error = %e, "playback_error");
                Err(EngineError::Playback(e))
            }
        }
    }
}

/// RAII hold on the speaking guard; releases on drop so no failure path
/// can leak the Speaking state.
struct SpeakingTicket {
    flag: Arc<AtomicBool>,
}

impl SpeakingTicket {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for SpeakingTicket {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
