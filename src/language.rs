//! Languages the checker can target and the file extension each maps to.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

static BY_DISPLAY_NAME: Lazy<HashMap<&'static str, Language>> = Lazy::new(|| {
    Language::all()
        .iter()
        .map(|&lang| (lang.display_name(), lang))
        .collect()
});

/// Source language selected for a scan or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    /// C# (`.cs`)
    #[default]
    CSharp,
    /// C (`.c`)
    C,
    /// C++ (`.cpp`)
    Cpp,
    /// Python (`.py`)
    Python,
    /// Java (`.java`)
    Java,
    /// JavaScript (`.js`)
    JavaScript,
}

impl Language {
    /// Returns the file extension (without the leading dot).
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::CSharp => "cs",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Python => "py",
            Self::Java => "java",
            Self::JavaScript => "js",
        }
    }

    /// Returns the name shown to users, e.g. `C#`.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::CSharp => "C#",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Python => "Python",
            Self::Java => "Java",
            Self::JavaScript => "JavaScript",
        }
    }

    /// Returns all supported languages in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::CSharp,
            Self::C,
            Self::Cpp,
            Self::Python,
            Self::Java,
            Self::JavaScript,
        ]
    }

    /// Looks up a language by its display name (`"C#"`, `"Python"`, ...).
    #[must_use]
    pub fn from_display_name(name: &str) -> Option<Self> {
        BY_DISPLAY_NAME.get(name).copied()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
