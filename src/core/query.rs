//! Query parameters and pagination utilities

use indexmap::IndexMap;
use serde::Serialize;

/// Query key selecting the serialised fields
pub const FIELDS_KEY: &str = "_fields";
/// Query key selecting the ordering
pub const SORT_KEY: &str = "_sort";
/// Query key naming a record whose page should be returned
pub const SHOW_KEY: &str = "_show";
/// Full project selector
pub const PROJECT_SELECTOR: &str = "project__id";
/// Legacy bare project selector
pub const BARE_PROJECT_SELECTOR: &str = "project";

/// Multi-valued query parameters, keyed in first-seen order
///
/// Built from the raw `(key, value)` pairs of a query string, so repeated
/// keys keep every value.
///
/// # Example
/// ```rust,ignore
/// // GET /core/note?status=draft&status=final&_sort=-id&limit=10
/// pub async fn list(Query(pairs): Query<Vec<(String, String)>>) {
///     let params = QueryParams::from_pairs(pairs);
///     assert_eq!(params.get_all("status").len(), 2);
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: IndexMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.push(key, value);
        }
        params
    }

    /// Append a value to a key
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// First value of a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every value of a key, in request order
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check if a key is never a filter (`offset`, `limit`, `_*`)
    pub fn is_reserved(key: &str) -> bool {
        key == "offset" || key == "limit" || key.starts_with('_')
    }

    /// Filter keys and their values, reserved keys skipped
    pub fn filter_fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .filter(|(key, _)| !Self::is_reserved(key))
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Requested offset; unparsable values count as absent
    pub fn offset(&self) -> Option<usize> {
        self.get("offset").and_then(|v| v.trim().parse().ok())
    }

    /// Requested page size; unparsable values count as absent
    pub fn limit(&self) -> Option<usize> {
        self.get("limit").and_then(|v| v.trim().parse().ok())
    }

    /// Fields requested with `_fields=a,b`
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get(FIELDS_KEY).map(split_list)
    }

    /// Sort keys requested with `_sort=a,-b`
    pub fn sort(&self) -> Vec<SortKey> {
        self.get(SORT_KEY)
            .map(|raw| split_list(raw).iter().map(|s| SortKey::parse(s)).collect())
            .unwrap_or_default()
    }

    /// Record to jump to, from `_show`
    pub fn show(&self) -> Option<&str> {
        self.get(SHOW_KEY)
    }

    /// Check for the `project__id` selector
    pub fn has_project_selector(&self) -> bool {
        self.contains_key(PROJECT_SELECTOR)
    }

    /// Check for the legacy bare `project` selector
    pub fn has_bare_project_selector(&self) -> bool {
        self.contains_key(BARE_PROJECT_SELECTOR)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// One ordering key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// `-name` sorts descending, `name` ascending
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self::asc(raw),
        }
    }
}

/// Paginated response structure
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub results: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub offset: usize,

    /// Page size, `None` when the list is unpaginated
    pub limit: Option<usize>,

    /// Total number of items (after filters)
    pub count: usize,

    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(offset: usize, limit: Option<usize>, count: usize) -> Self {
        let has_next = match limit {
            Some(limit) => offset.saturating_add(limit) < count,
            None => false,
        };

        Self {
            offset,
            limit,
            count,
            has_next,
            has_prev: offset > 0,
        }
    }
}
