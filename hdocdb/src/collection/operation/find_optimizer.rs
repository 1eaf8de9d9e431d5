use crate::collection::{IndexHint, QueryInfo, TieBreak};
use crate::common::{SortOrder, Value};
use crate::condition::{condition_ranges, Condition, ConditionRange, RangeBound};
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::index::key_codec::encode_value;
use crate::index::{index_prefix, IndexDescriptor, IndexField};
use crate::store::{prefix_successor, ScanRange};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// How a query will reach its rows.
#[derive(Debug, Clone)]
pub(crate) struct FindPlan {
    index: Option<IndexDescriptor>,
    // one range per leading index field, ending at the first non-singleton
    bounds: Vec<ConditionRange>,
}

impl FindPlan {
    pub fn full_scan() -> FindPlan {
        FindPlan {
            index: None,
            bounds: Vec::new(),
        }
    }

    pub fn index(&self) -> Option<&IndexDescriptor> {
        self.index.as_ref()
    }

    pub fn bounds(&self) -> &[ConditionRange] {
        &self.bounds
    }

    /// Leaves the index scan answers, re-checked on every fetched row.
    pub fn bound_leaves(&self) -> Vec<Condition> {
        self.bounds
            .iter()
            .flat_map(|range| range.leaves().iter().cloned())
            .collect()
    }

    pub fn query_info(&self) -> QueryInfo {
        match &self.index {
            None => QueryInfo::full_table_scan(),
            Some(index) => {
                let bounds: IndexMap<String, String> = self
                    .bounds
                    .iter()
                    .map(|range| (range.path().to_string(), range.to_string()))
                    .collect();
                QueryInfo::index_scan(index.name(), bounds)
            }
        }
    }

    /// Row key range of the index table holding every entry the bounds allow.
    ///
    /// Singleton bounds extend the key prefix. A trailing open range is turned into start and
    /// stop keys; on a descending field the upper bound comes first. Unbounded ends exclude
    /// entries indexed as null.
    pub fn scan_range(&self) -> HDocResult<ScanRange> {
        let Some(index) = &self.index else {
            return Ok(ScanRange::all());
        };
        let mut prefix = index_prefix(index.name())?;
        let mut open: Option<(&IndexField, &ConditionRange)> = None;
        for (field, range) in index.definition().fields().iter().zip(&self.bounds) {
            match (range.is_singleton(), range.lower().value()) {
                (true, Some(value)) => encode_value(value, field.order(), &mut prefix)?,
                _ => open = Some((field, range)),
            }
        }
        let Some((field, range)) = open else {
            return Ok(ScanRange::prefix(&prefix));
        };

        let order = field.order();
        let (first, second) = match order {
            SortOrder::Ascending => (range.lower(), range.upper()),
            SortOrder::Descending => (range.upper(), range.lower()),
        };
        let start = match first {
            RangeBound::Unbounded => match order {
                SortOrder::Ascending => successor(&extend(&prefix, &Value::Null, order)?)?,
                SortOrder::Descending => prefix.clone(),
            },
            RangeBound::Included(v) => extend(&prefix, v, order)?,
            RangeBound::Excluded(v) => successor(&extend(&prefix, v, order)?)?,
        };
        let stop = match second {
            RangeBound::Unbounded => match order {
                SortOrder::Ascending => prefix_successor(&prefix),
                SortOrder::Descending => Some(extend(&prefix, &Value::Null, order)?),
            },
            RangeBound::Included(v) => prefix_successor(&extend(&prefix, v, order)?),
            RangeBound::Excluded(v) => Some(extend(&prefix, v, order)?),
        };
        Ok(ScanRange::new(Some(start), stop))
    }
}

fn extend(prefix: &[u8], value: &Value, order: SortOrder) -> HDocResult<Vec<u8>> {
    let mut key = prefix.to_vec();
    encode_value(value, order, &mut key)?;
    Ok(key)
}

fn successor(key: &[u8]) -> HDocResult<Vec<u8>> {
    // index keys open with the encoded name, so they are never all 0xFF
    prefix_successor(key).ok_or_else(|| {
        log::error!("Index key has no successor");
        HDocError::new("Index key has no successor", ErrorKind::InternalError)
    })
}

/// Chooses between a full table scan and an index scan, caching its choices.
#[derive(Clone)]
pub(crate) struct FindOptimizer {
    inner: Arc<FindOptimizerInner>,
}

impl FindOptimizer {
    pub fn new(tie_break: TieBreak, cache_capacity: usize) -> Self {
        FindOptimizer {
            inner: Arc::new(FindOptimizerInner {
                cache: DashMap::new(),
                cache_capacity,
                index_version: AtomicU64::new(u64::MAX),
                tie_break,
            }),
        }
    }

    /// Plans `condition` over the `active` indexes, listed in declaration order.
    ///
    /// `index_version` identifies the index set; cached plans made for another set are
    /// discarded first.
    pub fn create_find_plan(
        &self,
        condition: &Condition,
        hint: &IndexHint,
        active: &[IndexDescriptor],
        index_version: u64,
    ) -> HDocResult<Arc<FindPlan>> {
        self.inner.create_find_plan(condition, hint, active, index_version)
    }

    pub fn invalidate_cache(&self) {
        self.inner.cache.clear();
    }

    #[cfg(test)]
    fn cached_plans(&self) -> usize {
        self.inner.cache.len()
    }
}

struct FindOptimizerInner {
    cache: DashMap<String, Arc<FindPlan>>,
    cache_capacity: usize,
    index_version: AtomicU64,
    tie_break: TieBreak,
}

impl FindOptimizerInner {
    fn create_find_plan(
        &self,
        condition: &Condition,
        hint: &IndexHint,
        active: &[IndexDescriptor],
        index_version: u64,
    ) -> HDocResult<Arc<FindPlan>> {
        if *hint == IndexHint::NoIndex {
            return Ok(Arc::new(FindPlan::full_scan()));
        }
        if self.index_version.swap(index_version, Ordering::AcqRel) != index_version {
            self.cache.clear();
        }

        let cache_key = format!("{:?}|{:?}", hint, condition);
        if let Some(plan) = self.cache.get(&cache_key) {
            return Ok(plan.clone());
        }

        let plan = Arc::new(self.plan(condition, hint, active)?);
        if self.cache_capacity > 0 {
            if self.cache.len() >= self.cache_capacity {
                self.cache.clear();
            }
            self.cache.insert(cache_key, plan.clone());
        }
        Ok(plan)
    }

    fn plan(
        &self,
        condition: &Condition,
        hint: &IndexHint,
        active: &[IndexDescriptor],
    ) -> HDocResult<FindPlan> {
        let ranges = condition_ranges(condition);

        let candidates: Vec<&IndexDescriptor> = match hint {
            IndexHint::Named(name) => match active.iter().find(|d| d.name() == name) {
                Some(descriptor) => vec![descriptor],
                None => {
                    log::error!("Hinted index {} is not active", name);
                    return Err(HDocError::new(
                        &format!("Hinted index {} is not active", name),
                        ErrorKind::IndexNotFound,
                    ));
                }
            },
            _ => active.iter().collect(),
        };

        let mut best: Option<(&IndexDescriptor, Vec<ConditionRange>)> = None;
        for descriptor in candidates {
            let bounds = covered_bounds(descriptor, &ranges);
            if bounds.is_empty() {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, current_bounds)) => {
                    self.prefers(descriptor, &bounds, current, current_bounds)
                }
            };
            if better {
                best = Some((descriptor, bounds));
            }
        }

        match best {
            Some((descriptor, bounds)) => {
                log::debug!(
                    "Planned {} with index {} over {} field(s)",
                    condition,
                    descriptor.name(),
                    bounds.len()
                );
                Ok(FindPlan {
                    index: Some(descriptor.clone()),
                    bounds,
                })
            }
            None => {
                log::debug!("Planned {} as a full table scan", condition);
                Ok(FindPlan::full_scan())
            }
        }
    }

    /// Whether a later-declared candidate beats the current choice.
    fn prefers(
        &self,
        candidate: &IndexDescriptor,
        bounds: &[ConditionRange],
        current: &IndexDescriptor,
        current_bounds: &[ConditionRange],
    ) -> bool {
        if bounds.len() != current_bounds.len() {
            return bounds.len() > current_bounds.len();
        }
        match self.tie_break {
            TieBreak::DeclarationOrder => false,
            TieBreak::ReverseDeclarationOrder => true,
            TieBreak::FewestFields => {
                candidate.definition().fields().len() < current.definition().fields().len()
            }
        }
    }
}

/// The ranges that drive a scan of `descriptor`, leading field first.
fn covered_bounds(
    descriptor: &IndexDescriptor,
    ranges: &IndexMap<crate::path::FieldPath, ConditionRange>,
) -> Vec<ConditionRange> {
    let mut bounds = Vec::new();
    for field in descriptor.definition().fields() {
        let Some(range) = ranges.get(field.path()) else {
            break;
        };
        if !fits(field, range) {
            break;
        }
        bounds.push(range.clone());
        if !range.is_singleton() {
            break;
        }
    }
    bounds
}

/// A range only helps when the field indexes its literals under their own value; literals of
/// another type class would be stored as null.
fn fits(field: &IndexField, range: &ConditionRange) -> bool {
    [range.lower(), range.upper()]
        .into_iter()
        .filter_map(RangeBound::value)
        .all(|v| field.value_type().accepts(v.value_type()))
}
