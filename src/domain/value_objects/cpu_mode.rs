use serde::{Deserialize, Serialize};

/// How the CPU idle threshold is chosen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CpuMode {
    /// Use the fixed threshold from the configuration; the calibrator is ignored.
    Manual,
    /// Learn a machine-specific threshold and keep it up to date.
    #[default]
    Auto,
}

impl std::fmt::Display for CpuMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Auto => write!(f, "auto"),
        }
    }
}
