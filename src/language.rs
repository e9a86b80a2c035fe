//! Supported voice languages.

/// A synthesis language. Selects the asset subdirectory and the model
/// cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    En,
    Ar,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Ar];

    /// Parse a wire token. Anything other than `"AR"` is English.
    pub fn from_wire(token: &str) -> Self {
        if token == "AR" {
            Self::Ar
        } else {
            Self::En
        }
    }

    /// The literal token used on the wire and in logs.
    pub fn wire_token(self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::Ar => "AR",
        }
    }

    /// Asset subdirectory name under the voice root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_token())
    }
}
