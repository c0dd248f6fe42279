use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    copy_pool::CopyId,
    error::LendingError,
    resource::{Resource, ResourceId},
};

/// Borrow limit every new account starts with
pub const DEFAULT_BORROW_LIMIT: usize = 3;

/// Clean returns needed for each loyalty step
pub const DEFAULT_LOYALTY_INTERVAL: u64 = 3;

/// Identifier of a registered member
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for MemberId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Membership category; carries descriptive data only
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum MemberKind {
    /// An enrolled student
    Student {
        /// Institution-issued student number
        student_id: Uuid,
    },
    /// A member of staff
    Faculty {
        /// Institution-issued staff number
        faculty_id: Uuid,
    },
    /// A former student
    Alumni,
}

impl MemberKind {
    /// A student with a freshly issued student number
    #[must_use]
    pub fn student() -> Self {
        Self::Student { student_id: Uuid::new_v4() }
    }

    /// Faculty with a freshly issued staff number
    #[must_use]
    pub fn faculty() -> Self {
        Self::Faculty { faculty_id: Uuid::new_v4() }
    }

    /// Short lowercase label for the category
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Student { .. } => "student",
            Self::Faculty { .. } => "faculty",
            Self::Alumni => "alumni",
        }
    }
}

/// One copy currently lent to a member
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Holding {
    /// Resource the copy belongs to
    pub resource: ResourceId,
    /// The exact copy handed out
    pub copy: CopyId,
}

/// What a successful return did to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemberReturn {
    /// Copy that came back
    pub copy: CopyId,
    /// Whether this return raised the borrow limit
    pub loyalty_raised: bool,
}

/// A member's borrowing entitlement and holdings
///
/// Holdings never exceed the borrow limit, and the limit only ever grows:
/// every `loyalty_interval`-th cumulative return, if clean, adds one loyalty
/// point and one borrowing slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemberAccount {
    /// Member identifier
    id: MemberId,
    /// Display name
    name: String,
    /// Contact address
    email: String,
    /// Category tag
    kind: MemberKind,
    /// Maximum number of concurrent holdings
    borrow_limit: usize,
    /// Loyalty points earned
    loyalty_points: u32,
    /// Returns needed per loyalty step
    loyalty_interval: u64,
    /// Copies currently held, in borrow order
    holdings: Vec<Holding>,
    /// Resources returned, in return order
    history: Vec<ResourceId>,
    /// Lifetime number of returns, clean or damaged
    total_return_count: u64,
}

impl MemberAccount {
    /// Create an account with the default entitlement
    pub fn new(
        id: impl Into<MemberId>,
        name: impl Into<String>,
        email: impl Into<String>,
        kind: MemberKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            kind,
            borrow_limit: DEFAULT_BORROW_LIMIT,
            loyalty_points: 0,
            loyalty_interval: DEFAULT_LOYALTY_INTERVAL,
            holdings: Vec::new(),
            history: Vec::new(),
            total_return_count: 0,
        }
    }

    /// Override the starting borrow limit and loyalty interval
    #[must_use]
    pub fn with_entitlement(mut self, borrow_limit: usize, loyalty_interval: u64) -> Self {
        self.borrow_limit = borrow_limit;
        self.loyalty_interval = loyalty_interval;
        self
    }

    /// Borrow one copy of `resource`
    ///
    /// The limit is checked before the pool is touched, so a full account never
    /// claims a copy, and a failed claim never uses up a slot.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::BorrowLimitReached` if the account is full and
    /// `LendingError::NoCopyAvailable` if the resource has no copy on the shelf.
    pub fn borrow(&mut self, resource: &mut Resource) -> Result<CopyId, LendingError> {
        if self.holdings.len() >= self.borrow_limit {
            return Err(LendingError::BorrowLimitReached {
                member: self.id.clone(),
                limit: self.borrow_limit,
            });
        }
        let copy =
            resource.borrow().ok_or_else(|| LendingError::NoCopyAvailable(resource.id().clone()))?;
        self.holdings.push(Holding { resource: resource.id().clone(), copy });
        Ok(copy)
    }

    /// Return one held copy of `resource`
    ///
    /// The copy goes back to the pool; a damaged copy is flagged and stays
    /// off the shelf until repaired.
    ///
    /// # Errors
    ///
    /// Returns `LendingError::NotHeld` if the member holds no copy of `resource`;
    /// the account and the resource are left untouched.
    pub fn return_resource(
        &mut self,
        resource: &mut Resource,
        damaged: bool,
    ) -> Result<MemberReturn, LendingError> {
        let Some(index) = self.holdings.iter().position(|h| h.resource == *resource.id()) else {
            return Err(LendingError::NotHeld {
                member: self.id.clone(),
                resource: resource.id().clone(),
            });
        };
        let holding = self.holdings.remove(index);
        self.history.push(holding.resource);
        self.total_return_count = self.total_return_count.saturating_add(1);

        if damaged {
            resource.mark_damaged(holding.copy);
        }
        resource.return_copy(holding.copy);

        let loyalty_raised =
            !damaged && self.total_return_count.checked_rem(self.loyalty_interval) == Some(0);
        if loyalty_raised {
            self.loyalty_points = self.loyalty_points.saturating_add(1);
            self.borrow_limit = self.borrow_limit.saturating_add(1);
        }

        Ok(MemberReturn { copy: holding.copy, loyalty_raised })
    }

    /// Whether the member holds at least one copy of `resource`
    #[must_use]
    pub fn holds(&self, resource: &str) -> bool {
        self.holdings.iter().any(|h| h.resource.as_str() == resource)
    }

    /// Member identifier
    #[must_use]
    pub fn id(&self) -> &MemberId {
        &self.id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Contact address
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Category tag
    #[must_use]
    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }

    /// Maximum number of concurrent holdings
    #[must_use]
    pub fn borrow_limit(&self) -> usize {
        self.borrow_limit
    }

    /// Loyalty points earned so far
    #[must_use]
    pub fn loyalty_points(&self) -> u32 {
        self.loyalty_points
    }

    /// Copies currently held
    #[must_use]
    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    /// Resources returned so far, oldest first
    #[must_use]
    pub fn history(&self) -> &[ResourceId] {
        &self.history
    }

    /// Lifetime number of returns
    #[must_use]
    pub fn total_return_count(&self) -> u64 {
        self.total_return_count
    }
}

impl fmt::Display for MemberAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} <{}> ({}, {}/{} held, {} loyalty)",
            self.id,
            self.name,
            self.email,
            self.kind.label(),
            self.holdings.len(),
            self.borrow_limit,
            self.loyalty_points
        )
    }
}
