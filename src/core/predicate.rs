//! Boolean predicate trees over (field, lookup, value) leaves
//!
//! Predicates are plain data: they are built by the access resolver and the
//! filter compiler and executed by a [`RecordStore`](crate::core::store::RecordStore).

use super::field::FieldValue;
use serde::Serialize;
use std::fmt;

/// Separator between the segments of a relation path (`project__status`)
pub const PATH_SEPARATOR: &str = "__";

/// Comparison applied by a predicate leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    Exact,
    IExact,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Contains,
    IContains,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Array length equals the value
    LenEq,
    /// Array length is greater than the value
    LenGt,
    /// Array contains every element of the value
    ArrayContains,
}

impl Lookup {
    /// Suffix used when rendering the leaf (`name__startswith`)
    pub fn suffix(self) -> &'static str {
        match self {
            Lookup::Exact => "",
            Lookup::IExact => "__iexact",
            Lookup::StartsWith => "__startswith",
            Lookup::IStartsWith => "__istartswith",
            Lookup::EndsWith => "__endswith",
            Lookup::IEndsWith => "__iendswith",
            Lookup::Contains => "__contains",
            Lookup::IContains => "__icontains",
            Lookup::Gt => "__gt",
            Lookup::Gte => "__gte",
            Lookup::Lt => "__lt",
            Lookup::Lte => "__lte",
            Lookup::LenEq => "__len",
            Lookup::LenGt => "__len__gt",
            Lookup::ArrayContains => "__contains",
        }
    }
}

/// A single comparison against one field path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub lookup: Lookup,
    pub value: FieldValue,
}

impl Condition {
    pub fn new(field: impl Into<String>, lookup: Lookup, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            lookup,
            value: value.into(),
        }
    }

    /// First segment of the field path
    pub fn root(&self) -> &str {
        self.field
            .split(PATH_SEPARATOR)
            .next()
            .unwrap_or(self.field.as_str())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}={}", self.field, self.lookup.suffix(), self.value)
    }
}

/// Boolean tree of conditions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every row
    Always,
    Leaf(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn leaf(field: impl Into<String>, lookup: Lookup, value: impl Into<FieldValue>) -> Self {
        Predicate::Leaf(Condition::new(field, lookup, value))
    }

    /// Equality leaf
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::leaf(field, Lookup::Exact, value)
    }

    /// Conjunction, flattening nested ANDs and dropping `Always`
    pub fn mk_and(parts: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Predicate::Always => {}
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::Always,
            1 => flat.remove(0),
            _ => Predicate::And(flat),
        }
    }

    /// Disjunction, flattening nested ORs
    ///
    /// An `Always` member makes the whole disjunction `Always`. An empty
    /// disjunction matches nothing.
    pub fn mk_or(parts: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Predicate::Always => return Predicate::Always,
                Predicate::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Predicate::Or(flat)
        }
    }

    pub fn mk_not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    /// AND another predicate into this one in place
    pub fn and_with(&mut self, other: Predicate) {
        let current = std::mem::replace(self, Predicate::Always);
        *self = Self::mk_and(vec![current, other]);
    }

    /// Check if this predicate places no restriction
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Predicate::Always)
    }

    /// All conditions in the tree, depth first
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Predicate::Always => {}
            Predicate::Leaf(c) => out.push(c),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_conditions(out);
                }
            }
            Predicate::Not(inner) => inner.collect_conditions(out),
        }
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::Always
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, op: &str, parts: &[Predicate]) -> fmt::Result {
            write!(f, "{}(", op)?;
            for (i, p) in parts.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", p)?;
            }
            f.write_str(")")
        }

        match self {
            Predicate::Always => f.write_str("TRUE"),
            Predicate::Leaf(c) => write!(f, "{}", c),
            Predicate::And(parts) => join(f, "AND", parts),
            Predicate::Or(parts) => join(f, "OR", parts),
            Predicate::Not(inner) => write!(f, "NOT({})", inner),
        }
    }
}

/// A primary predicate plus auxiliary predicates applied as separate steps
///
/// Auxiliary entries exist for repeated constraints on one many-to-many
/// relation: applying them separately lets each match a different related row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredicateList {
    pub primary: Predicate,
    pub auxiliary: Vec<Predicate>,
}

impl PredicateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the list constrains nothing
    pub fn is_empty(&self) -> bool {
        self.primary.is_unrestricted() && self.auxiliary.is_empty()
    }

    /// Number of predicate trees, counting the primary one
    pub fn len(&self) -> usize {
        1 + self.auxiliary.len()
    }
}
