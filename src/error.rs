use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{copy_pool::CopyId, member::MemberId, resource::ResourceId};

/// Outcome of a lending operation that did not go through
///
/// Lookup failures (`MemberNotFound`, `ResourceNotFound`, `NotHeld`) signal
/// misuse by the caller, while `BorrowLimitReached` and `NoCopyAvailable` are
/// legitimate refusals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LendingError {
    /// No member is registered under the given id
    #[error("member {0} is not registered")]
    MemberNotFound(MemberId),
    /// No resource is catalogued under the given id
    #[error("resource {0} is not in the catalog")]
    ResourceNotFound(ResourceId),
    /// The member already holds as many resources as their limit allows
    #[error("member {member} already holds {limit} resources")]
    BorrowLimitReached {
        /// Member that was refused
        member: MemberId,
        /// Borrow limit at the time of the request
        limit: usize,
    },
    /// Every copy of the resource is out or awaiting repair
    #[error("no copy of {0} is available")]
    NoCopyAvailable(ResourceId),
    /// The member returned something they do not hold
    #[error("member {member} does not hold {resource}")]
    NotHeld {
        /// Member that attempted the return
        member: MemberId,
        /// Resource named in the return
        resource: ResourceId,
    },
    /// A copy id that is not part of the resource's pool
    #[error("copy {copy} does not belong to {resource}")]
    CopyNotFound {
        /// Resource whose pool was searched
        resource: ResourceId,
        /// Copy that was not found
        copy: CopyId,
    },
    /// A resource with this id is already catalogued
    #[error("resource {0} is already in the catalog")]
    DuplicateResource(ResourceId),
    /// A member with this id is already registered
    #[error("member {0} is already registered")]
    DuplicateMember(MemberId),
}

impl LendingError {
    /// Whether the request named an unknown member, resource or holding
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::MemberNotFound(_)
                | Self::ResourceNotFound(_)
                | Self::NotHeld { .. }
                | Self::CopyNotFound { .. }
        )
    }

    /// Whether the request was valid but legitimately declined
    #[must_use]
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::BorrowLimitReached { .. } | Self::NoCopyAvailable(_))
    }
}

/// A catalog or member line that could not be ingested
#[derive(Debug, Error)]
pub enum IngestError {
    /// Too few whitespace-separated fields
    #[error("line {line}: expected {expected} fields, got {found}")]
    FieldCount {
        /// One-based line number
        line: usize,
        /// Minimum number of fields
        expected: usize,
        /// Fields actually present
        found: usize,
    },
    /// A numeric column did not parse
    #[error("line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        /// One-based line number
        line: usize,
        /// Column name
        field: &'static str,
        /// Raw text of the column
        value: String,
    },
    /// Resource type column is not book, thesis or paper
    #[error("line {line}: unknown resource type {kind:?}")]
    UnknownResourceType {
        /// One-based line number
        line: usize,
        /// Raw text of the type column
        kind: String,
    },
    /// Member category column is not student, faculty or alumni
    #[error("line {line}: unknown member category {category:?}")]
    UnknownMemberCategory {
        /// One-based line number
        line: usize,
        /// Raw text of the category column
        category: String,
    },
    /// The parsed entry collided with one already loaded
    #[error("line {line}: {source}")]
    Rejected {
        /// One-based line number
        line: usize,
        /// Why the engine refused the entry
        source: LendingError,
    },
    /// The input could not be read at all
    #[error("failed to read {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O failure
        source: io::Error,
    },
}

/// Failure to load or apply configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O failure
        source: io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of its permitted range
    #[error("invalid config: {0}")]
    Invalid(String),
    /// The log filter could not be installed
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
