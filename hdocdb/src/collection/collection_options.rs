use crate::fragment::BucketConfig;
use std::fmt::{Display, Formatter};

/// How the planner picks between indexes that cover the same number of leading fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The index declared first wins.
    #[default]
    DeclarationOrder,
    /// The index declared last wins.
    ReverseDeclarationOrder,
    /// The index with the fewest fields wins, then declaration order.
    FewestFields,
}

impl Display for TieBreak {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TieBreak::DeclarationOrder => write!(f, "declaration order"),
            TieBreak::ReverseDeclarationOrder => write!(f, "reverse declaration order"),
            TieBreak::FewestFields => write!(f, "fewest fields"),
        }
    }
}

/// Per-collection settings given when a collection is first opened.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub(crate) buckets: Option<BucketConfig>,
    pub(crate) tie_break: Option<TieBreak>,
}

impl CollectionOptions {
    pub fn new() -> CollectionOptions {
        CollectionOptions::default()
    }

    /// Column-family layout. Must match the stored layout when the collection exists.
    pub fn buckets(mut self, buckets: BucketConfig) -> CollectionOptions {
        self.buckets = Some(buckets);
        self
    }

    /// Overrides the database-wide tie-break rule for this collection.
    pub fn tie_break(mut self, tie_break: TieBreak) -> CollectionOptions {
        self.tie_break = Some(tie_break);
        self
    }
}
