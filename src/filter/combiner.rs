//! Predicate combiner: access, filter and exclude predicates to a query plan

use crate::core::predicate::{Predicate, PredicateList};
use crate::core::query::SortKey;
use serde::Serialize;

/// One step of a query plan, applied on top of the previous steps
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", content = "predicate", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep rows matching the predicate
    Include(Predicate),
    /// Drop rows matching the predicate
    Exclude(Predicate),
}

impl Constraint {
    pub fn predicate(&self) -> &Predicate {
        match self {
            Constraint::Include(p) | Constraint::Exclude(p) => p,
        }
    }
}

/// The ordered constraint sequence handed to storage
///
/// Steps are evaluated independently, so two steps on one many-to-many
/// relation may be satisfied by different related rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub constraints: Vec<Constraint>,
    /// Drop duplicate rows from the result
    pub distinct: bool,
    pub sort: Vec<SortKey>,
}

impl QueryPlan {
    /// Plan returning every row
    pub fn all() -> Self {
        Self {
            constraints: vec![Constraint::Include(Predicate::Always)],
            distinct: true,
            sort: Vec::new(),
        }
    }

    /// Plan matching one predicate
    pub fn matching(predicate: Predicate) -> Self {
        Self {
            constraints: vec![Constraint::Include(predicate)],
            distinct: true,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }
}

/// Combine the access predicate with compiled filter and exclude lists
///
/// 1. `access AND filter.primary AND NOT exclude.primary`; the NOT is left
///    out when nothing is excluded
/// 2. each auxiliary filter predicate as its own step
/// 3. each auxiliary exclude predicate as its own negated step
pub fn combine(access: Predicate, filter: PredicateList, exclude: PredicateList) -> QueryPlan {
    let mut first = vec![access, filter.primary];
    if !exclude.primary.is_unrestricted() {
        first.push(Predicate::mk_not(exclude.primary));
    }

    let mut constraints = Vec::with_capacity(1 + filter.auxiliary.len() + exclude.auxiliary.len());
    constraints.push(Constraint::Include(Predicate::mk_and(first)));
    constraints.extend(filter.auxiliary.into_iter().map(Constraint::Include));
    constraints.extend(exclude.auxiliary.into_iter().map(Constraint::Exclude));

    QueryPlan {
        constraints,
        distinct: true,
        sort: Vec::new(),
    }
}

/// Offset of the page holding `target` in an ordered id sequence
///
/// An unknown or unparsable target counts as position 0.
pub fn jump_offset<T: PartialEq>(ids: &[T], target: Option<&T>, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    let position = target
        .and_then(|t| ids.iter().position(|id| id == t))
        .unwrap_or(0);
    (position / page_size) * page_size
}
