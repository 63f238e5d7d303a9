use std::fmt;

use serde::{Deserialize, Serialize};

/// AccessMode is the ordered currency of every permission decision:
/// a grant is sufficient iff `granted >= required`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    #[default]
    None = 0,
    Read = 1,
    Write = 2,
    Admin = 3,
    Owner = 4,
}

impl AccessMode {
    /// Parses a permission label from external input.
    ///
    /// Anything that is not "write" or "admin" maps to Read, never to
    /// None or Owner. Imported grant lists have carried unrecognized
    /// labels for years and existing installs expect them to keep
    /// resolving to read access, so this stays lossy on purpose.
    pub fn parse(s: &str) -> AccessMode {
        match s {
            "write" => AccessMode::Write,
            "admin" => AccessMode::Admin,
            _ => AccessMode::Read,
        }
    }

    /// Returns true if this mode satisfies the required one.
    #[must_use]
    pub fn has(self, required: AccessMode) -> bool {
        self >= required
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessMode::None => "none",
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Admin => "admin",
            AccessMode::Owner => "owner",
        };
        write!(f, "{s}")
    }
}

impl From<i64> for AccessMode {
    fn from(v: i64) -> Self {
        match v {
            1 => AccessMode::Read,
            2 => AccessMode::Write,
            3 => AccessMode::Admin,
            4 => AccessMode::Owner,
            _ => AccessMode::None,
        }
    }
}

impl From<AccessMode> for i64 {
    fn from(mode: AccessMode) -> Self {
        mode as i64
    }
}
