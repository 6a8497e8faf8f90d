//! Transformation profiles accepted by the obfuscator's `--preset` switch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named preset controlling the strength and style of the transformation.
///
/// The set is closed: anything outside it is rejected before a subprocess
/// is ever spawned, so the value can be passed to the tool as a plain argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Profile {
    /// Whitespace and identifier minification only.
    #[default]
    Minify,
    Weak,
    /// Virtualizes the source into a bytecode interpreter.
    Vmify,
    Medium,
    Strong,
}

impl Profile {
    /// Every accepted profile, in the order they are advertised to clients.
    pub const ALL: [Profile; 5] = [
        Profile::Minify,
        Profile::Weak,
        Profile::Vmify,
        Profile::Medium,
        Profile::Strong,
    ];

    /// Returns the name the external tool expects for this preset.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minify => "Minify",
            Self::Weak => "Weak",
            Self::Vmify => "Vmify",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
        }
    }

    /// Comma-separated list of all profile names, e.g. for error messages.
    #[must_use]
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known profile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile: {0}")]
pub struct UnknownProfile(pub String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    /// Matching is exact and case-sensitive, mirroring the tool's own preset names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}
