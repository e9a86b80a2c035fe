//! Voice model trait seam and the per-language model cache.
//!
//! The session operates on trait objects so the real sherpa-onnx backend
//! and the test fakes are interchangeable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;

use crate::assets::LanguageAssets;
use crate::audio::AudioBuffer;
use crate::error::SynthesisError;
use crate::language::Language;

/// A loaded synthesis model for one language. Deterministic for a given
/// model+text pair; never mutated after construction.
pub trait VoiceModel: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<AudioBuffer, SynthesisError>;
}

/// Constructs a [`VoiceModel`] from resolved asset paths.
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        lang: Language,
        assets: &LanguageAssets,
    ) -> Result<Arc<dyn VoiceModel>, SynthesisError>;
}

/// Lazily builds and holds one model per language. Never evicts; a
/// synthesis failure at runtime does not clear the slot.
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    slots: Mutex<HashMap<Language, Arc<dyn VoiceModel>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached handle for `lang`, constructing it on first use.
    ///
    /// The slot lock is held across construction, so concurrent callers
    /// wait for the one in-flight load instead of racing a second one.
    /// Construction is expensive and must only run on the blocking worker.
    pub fn get_or_create(
        &self,
        lang: Language,
        assets: &LanguageAssets,
    ) -> Result<Arc<dyn VoiceModel>, SynthesisError> {
        let mut slots = self.slots.lock().unwrap();
        if let Some(model) = slots.get(&lang) {
            return Ok(Arc::clone(model));
        }

        let t0 = Instant::now();
        let model = self.loader.load(lang, assets)?;
        info!(
            lang = %lang,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "voice model loaded"
        );
        slots.insert(lang, Arc::clone(&model));
        Ok(model)
    }
}
