use std::str::FromStr;

use crate::error::DomainError;

/// Raw dataset id reserved for the engine's built-in dataset.
pub const BUILTIN_DATASET_SENTINEL: i64 = -1;

macro_rules! numeric_id {
    ($name:ident, $err:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = DomainError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| DomainError::$err(s.to_string()))
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(TaskId, InvalidTaskId);
numeric_id!(OwnerId, InvalidOwnerId);
numeric_id!(EndpointId, InvalidEndpointId);
numeric_id!(DatasetId, InvalidDatasetId);

/// Dataset selection for a task: the engine's built-in dataset or a catalog entry.
///
/// Serialized as the raw integer callers send, with `-1` meaning built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum DatasetRef {
    BuiltIn,
    Catalog(DatasetId),
}

impl DatasetRef {
    pub fn from_raw(raw: i64) -> Result<Self, DomainError> {
        if raw == BUILTIN_DATASET_SENTINEL {
            return Ok(Self::BuiltIn);
        }
        u64::try_from(raw)
            .map(|id| Self::Catalog(DatasetId::new(id)))
            .map_err(|_| DomainError::InvalidDatasetId(raw.to_string()))
    }

    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::BuiltIn => BUILTIN_DATASET_SENTINEL,
            Self::Catalog(id) => i64::try_from(id.get()).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn is_builtin(self) -> bool {
        matches!(self, Self::BuiltIn)
    }
}

impl TryFrom<i64> for DatasetRef {
    type Error = DomainError;
    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

impl From<DatasetRef> for i64 {
    fn from(d: DatasetRef) -> i64 {
        d.as_raw()
    }
}

impl std::fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuiltIn => f.write_str("builtin"),
            Self::Catalog(id) => write!(f, "{id}"),
        }
    }
}
