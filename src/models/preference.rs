use std::fmt;

use super::gender::Gender;

/// Partner-gender preference stored on the global profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Male,
    Female,
    Both,
}

impl Preference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Male => "male",
            Preference::Female => "female",
            Preference::Both => "both",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "male" => Some(Preference::Male),
            "female" => Some(Preference::Female),
            "both" => Some(Preference::Both),
            _ => None,
        }
    }

    /// Whether a partner of `gender` satisfies this preference.
    pub fn accepts(&self, gender: Option<Gender>) -> bool {
        match self {
            Preference::Both => true,
            Preference::Male => gender == Some(Gender::Male),
            Preference::Female => gender == Some(Gender::Female),
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
