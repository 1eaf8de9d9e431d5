use crate::errors::{ErrorKind, HDocError, HDocResult};
use std::fmt::{Display, Formatter};

/// Lifecycle of an index.
///
/// ```text
/// Created -> Building -> Active -> Inactive -> Dropped
///    ^                                            |
///    +--------------------------------------------+
/// ```
///
/// `Created`, `Building` and `Active` indexes receive entries on every write; only `Active`
/// ones are used by the planner. `Inactive` marks an index whose entries are waiting to be
/// purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexState {
    Created,
    Building,
    Active,
    Inactive,
    Dropped,
}

impl IndexState {
    pub fn can_transition_to(&self, next: IndexState) -> bool {
        match (self, next) {
            (IndexState::Dropped, next) => next == IndexState::Created,
            (IndexState::Inactive, next) => next == IndexState::Dropped,
            (IndexState::Building | IndexState::Active, IndexState::Created) => false,
            _ => true,
        }
    }

    pub fn transition(&self, next: IndexState) -> HDocResult<IndexState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            log::error!("Index cannot move from {} to {}", self, next);
            Err(HDocError::new(
                &format!("Index cannot move from {} to {}", self, next),
                ErrorKind::InvalidIndexState,
            ))
        }
    }

    /// Whether writes to the collection maintain entries for the index.
    pub fn is_maintained(&self) -> bool {
        matches!(
            self,
            IndexState::Created | IndexState::Building | IndexState::Active
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexState::Created => "CREATED",
            IndexState::Building => "BUILDING",
            IndexState::Active => "ACTIVE",
            IndexState::Inactive => "INACTIVE",
            IndexState::Dropped => "DROPPED",
        }
    }

    pub fn from_name(name: &str) -> Option<IndexState> {
        match name {
            "CREATED" => Some(IndexState::Created),
            "BUILDING" => Some(IndexState::Building),
            "ACTIVE" => Some(IndexState::Active),
            "INACTIVE" => Some(IndexState::Inactive),
            "DROPPED" => Some(IndexState::Dropped),
            _ => None,
        }
    }
}

impl Display for IndexState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
