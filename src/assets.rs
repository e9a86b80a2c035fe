//! Voice asset layout and the installation predicate.
//!
//! Layout per language under the voice root:
//!
//! ```text
//! voice/<lang>/model.*           required
//! voice/<lang>/tokens.*          required
//! voice/<lang>/espeak-ng-data/   optional lexicon data
//! ```
//!
//! Presence of the two required files is the sole installation predicate.
//! The filesystem is re-probed on every call; the answer is never cached.

use std::fs;
use std::path::{Path, PathBuf};

use crate::language::Language;

/// Read-only view of the voice asset directory.
#[derive(Debug, Clone)]
pub struct VoiceAssets {
    root: PathBuf,
}

/// Resolved file paths for one installed language.
#[derive(Debug, Clone)]
pub struct LanguageAssets {
    pub model: PathBuf,
    pub tokens: PathBuf,
    /// Included in the model configuration only when the directory exists.
    pub espeak_data: Option<PathBuf>,
}

impl VoiceAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn language_dir(&self, lang: Language) -> PathBuf {
        self.root.join(lang.dir_name())
    }

    /// Locate the asset files for `lang`, or `None` if either required
    /// file is absent right now.
    pub fn resolve(&self, lang: Language) -> Option<LanguageAssets> {
        let dir = self.language_dir(lang);
        let model = find_by_stem(&dir, "model")?;
        let tokens = find_by_stem(&dir, "tokens")?;
        let espeak = dir.join("espeak-ng-data");
        let espeak_data = espeak.is_dir().then_some(espeak);
        Some(LanguageAssets {
            model,
            tokens,
            espeak_data,
        })
    }

    /// True iff both required files exist at check time.
    pub fn is_installed(&self, lang: Language) -> bool {
        self.resolve(lang).is_some()
    }
}

/// First regular file in `dir` whose stem matches, any extension.
fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if path.is_file() && path.file_stem().is_some_and(|s| s == stem) {
            return Some(path);
        }
    }
    None
}
