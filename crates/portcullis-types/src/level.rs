//! Security level types

use serde::{Deserialize, Serialize};

/// Coarse trust ranking assigned per authentication tier reached.
///
/// Ordering is meaningful: `Basic < Standard < High < Enterprise`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Password login
    #[default]
    Basic,
    /// API key
    Standard,
    /// Bearer token
    High,
    /// OAuth2 client credentials
    Enterprise,
}

impl SecurityLevel {
    /// All levels, lowest first
    pub const ALL: [SecurityLevel; 4] = [
        Self::Basic,
        Self::Standard,
        Self::High,
        Self::Enterprise,
    ];

    /// Numeric rank (1 = basic .. 4 = enterprise)
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Basic => 1,
            Self::Standard => 2,
            Self::High => 3,
            Self::Enterprise => 4,
        }
    }

    /// Get the level string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = SecurityLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(SecurityLevelParseError(s.to_string())),
        }
    }
}

/// Error parsing a security level string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid security level: {0}")]
pub struct SecurityLevelParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(SecurityLevel::Basic < SecurityLevel::Standard);
        assert!(SecurityLevel::Standard < SecurityLevel::High);
        assert!(SecurityLevel::High < SecurityLevel::Enterprise);
        assert_eq!(
            SecurityLevel::ALL.iter().max(),
            Some(&SecurityLevel::Enterprise)
        );
    }

    #[test]
    fn test_level_parse_roundtrip() {
        for level in SecurityLevel::ALL {
            assert_eq!(level.to_string().parse::<SecurityLevel>().unwrap(), level);
        }
        assert!("root".parse::<SecurityLevel>().is_err());
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&SecurityLevel::Enterprise).unwrap();
        assert_eq!(json, "\"enterprise\"");
    }
}
