use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating profile selecting the system instructions and tool subset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Outline,
    Writing,
    Adjustment,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Outline, Mode::Writing, Mode::Adjustment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Outline => "outline",
            Mode::Writing => "writing",
            Mode::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outline" => Ok(Mode::Outline),
            "writing" => Ok(Mode::Writing),
            "adjustment" => Ok(Mode::Adjustment),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}
