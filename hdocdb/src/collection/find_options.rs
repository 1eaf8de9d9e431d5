/// Which index a query may use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexHint {
    /// Let the planner choose.
    #[default]
    Auto,
    /// Use the named index when it covers the condition, otherwise scan the table.
    Named(String),
    /// Always scan the table.
    NoIndex,
}

/// Options of a find or explain call.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub(crate) projection: Option<Vec<String>>,
    pub(crate) limit: Option<usize>,
    pub(crate) hint: IndexHint,
}

/// Options returning only the given paths (plus `_id`).
pub fn project(paths: &[&str]) -> FindOptions {
    FindOptions::new().projection(paths)
}

pub fn limit_to(limit: usize) -> FindOptions {
    FindOptions::new().limit(limit)
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn projection(mut self, paths: &[&str]) -> FindOptions {
        self.projection = Some(paths.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    pub fn hint(mut self, hint: IndexHint) -> FindOptions {
        self.hint = hint;
        self
    }

    pub fn use_index(self, name: &str) -> FindOptions {
        self.hint(IndexHint::Named(name.to_string()))
    }

    pub fn no_index(self) -> FindOptions {
        self.hint(IndexHint::NoIndex)
    }
}
