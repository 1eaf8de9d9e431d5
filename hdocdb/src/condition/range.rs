use crate::common::Value;
use crate::condition::{CompareOp, Condition};
use crate::path::FieldPath;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// One end of a [ConditionRange].
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Unbounded,
    Included(Value),
    Excluded(Value),
}

impl RangeBound {
    pub fn value(&self) -> Option<&Value> {
        match self {
            RangeBound::Unbounded => None,
            RangeBound::Included(v) | RangeBound::Excluded(v) => Some(v),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, RangeBound::Unbounded)
    }
}

/// The interval of values one leaf allows on a path, with the leaf it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionRange {
    path: FieldPath,
    lower: RangeBound,
    upper: RangeBound,
    leaves: Vec<Condition>,
}

impl ConditionRange {
    /// The range an index can scan for `leaf`, if any.
    ///
    /// Only comparisons other than `!=` and `in` lists qualify, on paths without wildcards and
    /// with literals that are neither null nor containers.
    pub fn from_leaf(leaf: &Condition) -> Option<ConditionRange> {
        let (path, lower, upper) = match leaf {
            Condition::Compare { path, op, value } => {
                if !indexable(value) {
                    return None;
                }
                let v = value.clone();
                match op {
                    CompareOp::Eq => (path, RangeBound::Included(v.clone()), RangeBound::Included(v)),
                    CompareOp::Lt => (path, RangeBound::Unbounded, RangeBound::Excluded(v)),
                    CompareOp::Le => (path, RangeBound::Unbounded, RangeBound::Included(v)),
                    CompareOp::Gt => (path, RangeBound::Excluded(v), RangeBound::Unbounded),
                    CompareOp::Ge => (path, RangeBound::Included(v), RangeBound::Unbounded),
                    CompareOp::Ne => return None,
                }
            }
            Condition::In { path, values } => {
                let (min, max) = enclose(values)?;
                (path, RangeBound::Included(min), RangeBound::Included(max))
            }
            _ => return None,
        };
        if path.has_wildcard() || path.is_root() {
            return None;
        }
        Some(ConditionRange {
            path: path.clone(),
            lower,
            upper,
            leaves: vec![leaf.clone()],
        })
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn lower(&self) -> &RangeBound {
        &self.lower
    }

    pub fn upper(&self) -> &RangeBound {
        &self.upper
    }

    /// The leaves whose conjunction this range stands for.
    pub fn leaves(&self) -> &[Condition] {
        &self.leaves
    }

    pub fn is_singleton(&self) -> bool {
        match (&self.lower, &self.upper) {
            (RangeBound::Included(a), RangeBound::Included(b)) => a.compare(b) == Some(Ordering::Equal),
            _ => false,
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.lower {
            RangeBound::Unbounded => true,
            RangeBound::Included(low) => matches!(value.compare(low), Some(o) if o != Ordering::Less),
            RangeBound::Excluded(low) => value.compare(low) == Some(Ordering::Greater),
        };
        let below = match &self.upper {
            RangeBound::Unbounded => true,
            RangeBound::Included(high) => {
                matches!(value.compare(high), Some(o) if o != Ordering::Greater)
            }
            RangeBound::Excluded(high) => value.compare(high) == Some(Ordering::Less),
        };
        above && below
    }
}

impl Display for ConditionRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.lower {
            RangeBound::Unbounded => write!(f, "(-inf")?,
            RangeBound::Included(v) => write!(f, "[{}", v)?,
            RangeBound::Excluded(v) => write!(f, "({}", v)?,
        }
        match &self.upper {
            RangeBound::Unbounded => write!(f, ", +inf)"),
            RangeBound::Included(v) => write!(f, ", {}]", v),
            RangeBound::Excluded(v) => write!(f, ", {})", v),
        }
    }
}

/// Per-path ranges of the index-usable leaves of a condition.
///
/// Ranges come from a single leaf or from the members of a top-level conjunction, nested
/// conjunctions flattened. Disjunctions contribute nothing. Each path is bounded by one leaf:
/// an equality if there is one, then an `in` list, then the first comparison. Array fields are
/// indexed once per element, and two leaves on one path may be satisfied by different
/// elements, so their intersection would skip matching documents.
pub fn condition_ranges(condition: &Condition) -> IndexMap<FieldPath, ConditionRange> {
    let mut leaves = Vec::new();
    flatten_and(condition, &mut leaves);

    let mut ranges: IndexMap<FieldPath, ConditionRange> = IndexMap::new();
    for leaf in leaves {
        let Some(range) = ConditionRange::from_leaf(leaf) else {
            continue;
        };
        let replace = ranges
            .get(range.path())
            .map_or(true, |existing| {
                existing.leaves.iter().all(|kept| selectivity(leaf) < selectivity(kept))
            });
        if replace {
            ranges.insert(range.path().clone(), range);
        }
    }
    ranges
}

fn selectivity(leaf: &Condition) -> u8 {
    match leaf {
        Condition::Compare { op: CompareOp::Eq, .. } => 0,
        Condition::In { .. } => 1,
        _ => 2,
    }
}

fn flatten_and<'a>(condition: &'a Condition, leaves: &mut Vec<&'a Condition>) {
    match condition {
        Condition::And(children) => {
            for child in children {
                flatten_and(child, leaves);
            }
        }
        Condition::Or(_) => {}
        leaf => leaves.push(leaf),
    }
}

fn indexable(value: &Value) -> bool {
    !value.is_null() && !value.is_container()
}

fn enclose(values: &[Value]) -> Option<(Value, Value)> {
    let mut iter = values.iter();
    let first = iter.next().filter(|v| indexable(v))?;
    let (mut min, mut max) = (first, first);
    for value in iter {
        if !indexable(value) {
            return None;
        }
        if value.compare(min)? == Ordering::Less {
            min = value;
        }
        if value.compare(max)? == Ordering::Greater {
            max = value;
        }
    }
    Some((min.clone(), max.clone()))
}
