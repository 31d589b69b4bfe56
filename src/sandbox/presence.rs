//! Sentinel parsing for text-only probe results.
//!
//! Probe commands end in `|| echo "<sentinel>"`, so "found nothing" is an
//! explicit word on stdout instead of an empty string that could equally
//! mean the transport dropped the output.

use super::CommandOutput;

/// What a probe command found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Presence {
    /// The probe found something; carries the trimmed output.
    Present(String),
    /// The probe ran and found nothing.
    Absent,
    /// The probe gave no usable answer.
    Unknown,
}

impl Presence {
    /// Classifies `output` of a command whose fallback branch prints `sentinel`.
    pub fn parse(output: &CommandOutput, sentinel: &str) -> Self {
        let text = output.stdout.trim();
        if text.contains(sentinel) {
            return Self::Absent;
        }
        if !text.is_empty() {
            return Self::Present(text.to_string());
        }
        match output.exit_code {
            Some(code) if code != 0 => Self::Unknown,
            _ => Self::Absent,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// The probe output, when something was found.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Present(text) => Some(text),
            Self::Absent | Self::Unknown => None,
        }
    }
}
