//! sherpa-onnx VITS synthesis backend.
//!
//! Wraps `sherpa_rs::tts::VitsTts` behind the [`VoiceModel`] seam. The
//! sherpa-rs `create` method takes `&mut self`, while the trait uses
//! `&self`, so the inner engine sits behind a `Mutex`. Synthesis runs on
//! the session's blocking worker, never the dispatch task.

use std::path::Path;
use std::sync::{Arc, Mutex};

use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
use tracing::{debug, info};

use crate::assets::LanguageAssets;
use crate::audio::AudioBuffer;
use crate::error::SynthesisError;
use crate::language::Language;
use crate::model::{ModelLoader, VoiceModel};

/// Builds one VITS engine per language from the resolved asset paths.
pub struct SherpaLoader {
    speaker_id: i32,
    speed: f32,
}

impl SherpaLoader {
    pub fn new(speaker_id: i32, speed: f32) -> Self {
        Self { speaker_id, speed }
    }
}

impl ModelLoader for SherpaLoader {
    fn load(
        &self,
        lang: Language,
        assets: &LanguageAssets,
    ) -> Result<Arc<dyn VoiceModel>, SynthesisError> {
        let model = path_to_string(&assets.model)?;
        let tokens = path_to_string(&assets.tokens)?;
        // The lexicon data dir is optional; sherpa treats "" as absent.
        let data_dir = match &assets.espeak_data {
            Some(dir) => path_to_string(dir)?,
            None => String::new(),
        };

        info!(
            lang = %lang,
            model = %assets.model.display(),
            espeak_data = !data_dir.is_empty(),
            "loading VITS model"
        );

        let config = VitsTtsConfig {
            model,
            tokens,
            data_dir,
            length_scale: 1.0,
            ..Default::default()
        };
        let engine = VitsTts::new(config);

        Ok(Arc::new(SherpaVoiceModel {
            engine: Mutex::new(engine),
            speaker_id: self.speaker_id,
            speed: self.speed,
        }))
    }
}

/// One loaded VITS model. Lives for the process lifetime once cached.
pub struct SherpaVoiceModel {
    engine: Mutex<VitsTts>,
    speaker_id: i32,
    speed: f32,
}

impl VoiceModel for SherpaVoiceModel {
    fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError> {
        let mut engine = self.engine.lock().unwrap();
        let audio = engine
            .create(text, self.speaker_id, self.speed)
            .map_err(|e| SynthesisError::Engine(e.to_string()))?;
        debug!(
            samples = audio.samples.len(),
            sample_rate = audio.sample_rate,
            "synthesis finished"
        );
        Ok(AudioBuffer::from_f32(&audio.samples, audio.sample_rate))
    }
}

fn path_to_string(path: &Path) -> Result<String, SynthesisError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| SynthesisError::Load(format!("non-UTF-8 path: {}", path.display())))
}
