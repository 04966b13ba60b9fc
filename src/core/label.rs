//! Sample labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a sample was typed by the account owner or by someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Genuine,
    Imposter,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Genuine => "Genuine",
            Label::Imposter => "Imposter",
        }
    }

    /// The positive class of the curation model.
    pub fn is_positive(&self) -> bool {
        *self == Label::Genuine
    }
}

impl Default for Label {
    fn default() -> Self {
        Label::Genuine
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Exact names only, matching what the sample files contain
        match s.trim() {
            "Genuine" => Ok(Label::Genuine),
            "Imposter" => Ok(Label::Imposter),
            other => Err(format!("unknown label '{other}' (expected Genuine or Imposter)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parsing() {
        assert_eq!("Genuine".parse::<Label>(), Ok(Label::Genuine));
        assert_eq!(" Imposter ".parse::<Label>(), Ok(Label::Imposter));
        assert!("impostor".parse::<Label>().is_err());
        assert!("genuine".parse::<Label>().is_err());
        assert!("IMPOSTER".parse::<Label>().is_err());
    }

    #[test]
    fn test_label_display_round_trips() {
        for label in [Label::Genuine, Label::Imposter] {
            assert_eq!(label.to_string().parse::<Label>(), Ok(label));
        }
        assert!(Label::Genuine.is_positive());
        assert!(!Label::Imposter.is_positive());
    }
}
