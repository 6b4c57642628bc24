use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Type tag carried by repository global handles.
pub const REPOSITORY_PHID_PREFIX: &str = "PHID-REPO-";

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn from_raw(id: i64) -> Self {
                Self(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

// Row keys are store-assigned integers, immutable after creation.
numeric_id!(RepositoryId);
numeric_id!(CommitId);

/// Global handle: an opaque, globally unique, type-tagged reference
/// string shared across the surrounding system.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phid(String);

impl Phid {
    /// Mint a fresh repository handle.
    pub fn generate() -> Self {
        let tail = Uuid::now_v7().simple().to_string();
        Self(format!("{REPOSITORY_PHID_PREFIX}{}", &tail[..20]))
    }

    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a token has the repository global-handle shape.
    pub fn is_repository_handle(token: &str) -> bool {
        token.starts_with(REPOSITORY_PHID_PREFIX)
    }
}

impl fmt::Display for Phid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Phid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
