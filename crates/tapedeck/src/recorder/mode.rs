//! Record mode definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Policy governing whether an unmatched request may trigger a live call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Always allow live calls and append the result.
    #[default]
    NewEpisodes,
    /// Allow live calls only while the cassette is newly created in this
    /// session; afterwards an unmatched request fails.
    Once,
    /// Never allow live calls; any unmatched request fails.
    None,
}

impl RecordMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordMode::NewEpisodes => "new_episodes",
            RecordMode::Once => "once",
            RecordMode::None => "none",
        }
    }

    /// The state machine: may an unmatched request proceed to a live call?
    pub fn allows_live_call(self, cassette_is_new: bool) -> bool {
        match self {
            RecordMode::NewEpisodes => true,
            RecordMode::Once => cassette_is_new,
            RecordMode::None => false,
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "new_episodes" => Ok(RecordMode::NewEpisodes),
            "once" => Ok(RecordMode::Once),
            "none" => Ok(RecordMode::None),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_call_policy() {
        assert!(RecordMode::NewEpisodes.allows_live_call(true));
        assert!(RecordMode::NewEpisodes.allows_live_call(false));
        assert!(RecordMode::Once.allows_live_call(true));
        assert!(!RecordMode::Once.allows_live_call(false));
        assert!(!RecordMode::None.allows_live_call(true));
        assert!(!RecordMode::None.allows_live_call(false));
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!("once".parse::<RecordMode>().unwrap(), RecordMode::Once);
        assert!(matches!(
            "always".parse::<RecordMode>().unwrap_err(),
            Error::InvalidMode(_)
        ));
    }
}
