use std::fmt;

use serde::{Deserialize, Serialize};

/// A functional unit of a repository. Teams grant access per unit, so a
/// team can open the issue tracker to its members without exposing the
/// code itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Code = 1,
    Issues = 2,
    PullRequests = 3,
    Releases = 4,
    Wiki = 5,
}

impl UnitType {
    /// Every unit type a repository or team can carry.
    pub const ALL: [UnitType; 5] = [
        UnitType::Code,
        UnitType::Issues,
        UnitType::PullRequests,
        UnitType::Releases,
        UnitType::Wiki,
    ];

    pub fn from_i64(v: i64) -> Option<UnitType> {
        match v {
            1 => Some(UnitType::Code),
            2 => Some(UnitType::Issues),
            3 => Some(UnitType::PullRequests),
            4 => Some(UnitType::Releases),
            5 => Some(UnitType::Wiki),
            _ => None,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitType::Code => "code",
            UnitType::Issues => "issues",
            UnitType::PullRequests => "pulls",
            UnitType::Releases => "releases",
            UnitType::Wiki => "wiki",
        };
        write!(f, "{s}")
    }
}

impl From<UnitType> for i64 {
    fn from(unit: UnitType) -> Self {
        unit as i64
    }
}
