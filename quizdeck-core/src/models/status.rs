use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a quiz record.
///
/// Deleting a quiz only moves it to `Deleted`; readers have to filter on this
/// field themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuizStatus {
    #[default]
    Live,
    Deleted,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Live => "LIVE",
            QuizStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for QuizStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LIVE" => Ok(QuizStatus::Live),
            "DELETED" => Ok(QuizStatus::Deleted),
            _ => Err(format!(
                "Invalid quiz status '{}'. Valid options: LIVE, DELETED",
                s
            )),
        }
    }
}
