use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    Unspecified,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Unspecified => "unspecified",
        })
    }
}

/// Who is taking the run. Fixed once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: Gender,
    /// Group or session-set number assigned by the protocol.
    #[serde(default)]
    pub group: u32,
}

impl Default for Participant {
    fn default() -> Self {
        Self {
            id: "0".to_string(),
            age: 0,
            gender: Gender::Unspecified,
            group: 0,
        }
    }
}
