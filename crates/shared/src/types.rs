//! Membership and listing enums
//!
//! All of these are stored as upper-case text columns, so each enum
//! round-trips through `as_str` / `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored value does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Membership tier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipTier {
    /// Free tier, listing stays live without a subscription
    Basic,
    /// Paid tier, listing is live only while a subscription period is running
    Premium,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Basic => "BASIC",
            MembershipTier::Premium => "PREMIUM",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipTier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Ok(MembershipTier::Basic),
            "PREMIUM" => Ok(MembershipTier::Premium),
            _ => Err(ParseEnumError::new("membership tier", s)),
        }
    }
}

/// Public visibility of a studio listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudioStatus {
    Active,
    Inactive,
}

impl StudioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudioStatus::Active => "ACTIVE",
            StudioStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for StudioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudioStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(StudioStatus::Active),
            "INACTIVE" => Ok(StudioStatus::Inactive),
            _ => Err(ParseEnumError::new("studio status", s)),
        }
    }
}

/// Type tag attached to a studio listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudioType {
    Home,
    Recording,
    Podcast,
    Voiceover,
    Editing,
    Other,
}

impl StudioType {
    pub const ALL: [StudioType; 6] = [
        StudioType::Home,
        StudioType::Recording,
        StudioType::Podcast,
        StudioType::Voiceover,
        StudioType::Editing,
        StudioType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudioType::Home => "HOME",
            StudioType::Recording => "RECORDING",
            StudioType::Podcast => "PODCAST",
            StudioType::Voiceover => "VOICEOVER",
            StudioType::Editing => "EDITING",
            StudioType::Other => "OTHER",
        }
    }
}

impl fmt::Display for StudioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudioType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        StudioType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| ParseEnumError::new("studio type", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing_is_case_insensitive() {
        assert_eq!("basic".parse::<MembershipTier>().unwrap(), MembershipTier::Basic);
        assert_eq!(" PREMIUM ".parse::<MembershipTier>().unwrap(), MembershipTier::Premium);
        assert!("gold".parse::<MembershipTier>().is_err());
    }

    #[test]
    fn test_status_display_matches_storage() {
        assert_eq!(StudioStatus::Active.to_string(), "ACTIVE");
        assert_eq!(StudioStatus::Inactive.to_string(), "INACTIVE");
    }

    #[test]
    fn test_studio_type_round_trips_every_variant() {
        for ty in StudioType::ALL {
            assert_eq!(ty.as_str().parse::<StudioType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_parse_error_names_the_kind() {
        let err = "booth".parse::<StudioType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown studio type value 'booth'");
    }
}
