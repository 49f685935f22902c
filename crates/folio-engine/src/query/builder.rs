//! Fluent query builder
//!
//! The builder holds one optional slot per key-bound shape and materializes
//! the highest-priority non-empty slot in [`Query::params`]. This is what
//! lets callers reconfigure fluently without the builder tracking call
//! history: `key` > `keys` > `prefix` > `range` > `scan`, regardless of the
//! order the setters ran in.

use folio_core::{EmitKey, FolioError, Result};

use crate::query::spec::{Order, QuerySpec, Shape};

/// Argument to [`Query::group`]
///
/// Mirrors the loosely typed source contract: a boolean flag or a numeric
/// level. `true` and `0` group by the full emit key; a positive number
/// groups by its floor; `false` clears the level without touching `reduce`;
/// anything else (negative, NaN, infinite) is an invalid group level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupAs {
    /// Enable or disable grouping by the full key
    Flag(bool),
    /// Group by the first `⌊level⌋` parts of the emit key
    Level(f64),
}

impl From<bool> for GroupAs {
    fn from(v: bool) -> Self {
        GroupAs::Flag(v)
    }
}

impl From<i64> for GroupAs {
    fn from(v: i64) -> Self {
        GroupAs::Level(v as f64)
    }
}

impl From<i32> for GroupAs {
    fn from(v: i32) -> Self {
        GroupAs::Level(v as f64)
    }
}

impl From<u32> for GroupAs {
    fn from(v: u32) -> Self {
        GroupAs::Level(v as f64)
    }
}

impl From<f64> for GroupAs {
    fn from(v: f64) -> Self {
        GroupAs::Level(v)
    }
}

/// Fluent builder for one query
///
/// All setters consume and return the builder. Numeric inputs are clamped:
/// negative `skip`/`limit` coerce to zero. An invalid `group` argument is
/// recorded and surfaced when [`params`](Query::params) materializes the
/// specification.
///
/// # Examples
///
/// ```
/// use folio_engine::{Order, Query};
///
/// let spec = Query::for_view("by-dept")
///     .prefix("engineering")
///     .order(Order::Descending)
///     .skip(1)
///     .limit(2)
///     .include_docs()
///     .params()
///     .unwrap();
/// assert_eq!(spec.shape.kind(), "prefix");
/// assert_eq!(spec.skip, 1);
/// assert_eq!(spec.limit, Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    view: String,
    key: Option<EmitKey>,
    keys: Option<Vec<EmitKey>>,
    prefix: Option<EmitKey>,
    range: Option<(EmitKey, EmitKey)>,
    id_range: Option<(String, String)>,
    reduce: bool,
    include_docs: bool,
    order: Order,
    skip: usize,
    limit: Option<usize>,
    group_level: Option<usize>,
    invalid_group: Option<String>,
}

impl Query {
    /// Start a query against the named view
    pub fn for_view(view: impl Into<String>) -> Self {
        Query {
            view: view.into(),
            key: None,
            keys: None,
            prefix: None,
            range: None,
            id_range: None,
            reduce: false,
            include_docs: false,
            order: Order::Ascending,
            skip: 0,
            limit: None,
            group_level: None,
            invalid_group: None,
        }
    }

    /// Select rows with exactly this emit key
    pub fn key(mut self, key: impl Into<EmitKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Select rows matching any of the given emit keys
    ///
    /// Accepted here; the executor rejects this shape at query time.
    pub fn keys<K: Into<EmitKey>>(mut self, keys: Vec<K>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Select rows whose emit key starts with this prefix
    pub fn prefix(mut self, prefix: impl Into<EmitKey>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Select rows in the half-open interval `[start, end)` of emit keys
    pub fn range(mut self, start: impl Into<EmitKey>, end: impl Into<EmitKey>) -> Self {
        self.range = Some((start.into(), end.into()));
        self
    }

    /// Refine the range edges with doc-id bounds
    ///
    /// Within rows sharing the boundary emit keys, `start_doc_id` moves the
    /// inclusive lower edge and `end_doc_id` the exclusive upper edge. Only
    /// meaningful together with [`range`](Query::range).
    pub fn id_range(
        mut self,
        start_doc_id: impl Into<String>,
        end_doc_id: impl Into<String>,
    ) -> Self {
        self.id_range = Some((start_doc_id.into(), end_doc_id.into()));
        self
    }

    /// Drop the first `n` rows (or groups, under reduce)
    ///
    /// Negative values clamp to zero.
    pub fn skip(mut self, n: i64) -> Self {
        self.skip = n.max(0) as usize;
        self
    }

    /// Yield at most `n` rows (or groups, under reduce)
    ///
    /// Negative values clamp to zero.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n.max(0) as usize);
        self
    }

    /// Attach the stored document snapshot to each map row
    pub fn include_docs(mut self) -> Self {
        self.include_docs = true;
        self
    }

    /// Explicitly set whether map rows carry documents
    pub fn include_docs_if(mut self, include: bool) -> Self {
        self.include_docs = include;
        self
    }

    /// Scan direction; may toggle freely
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Run the view's reduce function
    pub fn reduce(mut self) -> Self {
        self.reduce = true;
        self
    }

    /// Explicitly set whether to reduce
    pub fn reduce_if(mut self, reduce: bool) -> Self {
        self.reduce = reduce;
        self
    }

    /// Set the reduction grouping
    ///
    /// `true` or `0`: reduce on, group by the full emit key. A positive
    /// number: reduce on, group by the first `⌊n⌋` parts. `false`: clear the
    /// group level without touching `reduce`. Anything else fails with
    /// *InvalidGroupLevel* when the query is materialized.
    pub fn group(mut self, level: impl Into<GroupAs>) -> Self {
        match level.into() {
            GroupAs::Flag(true) => {
                self.reduce = true;
                self.group_level = Some(0);
            }
            GroupAs::Flag(false) => {
                self.group_level = None;
            }
            GroupAs::Level(x) if x == 0.0 => {
                self.reduce = true;
                self.group_level = Some(0);
            }
            GroupAs::Level(x) if x.is_finite() && x > 0.0 => {
                self.reduce = true;
                self.group_level = Some(x.floor() as usize);
            }
            GroupAs::Level(x) => {
                self.invalid_group = Some(x.to_string());
            }
        }
        self
    }

    /// Materialize the query specification
    ///
    /// The first satisfied shape in precedence order wins:
    /// key > keys > prefix > range > scan.
    pub fn params(&self) -> Result<QuerySpec> {
        if let Some(given) = &self.invalid_group {
            return Err(FolioError::invalid_group_level(given));
        }

        let shape = if let Some(key) = &self.key {
            Shape::Key(key.clone())
        } else if let Some(keys) = &self.keys {
            Shape::Keys(keys.clone())
        } else if let Some(prefix) = &self.prefix {
            Shape::Prefix(prefix.clone())
        } else if let Some((start, end)) = &self.range {
            let (start_doc_id, end_doc_id) = match &self.id_range {
                Some((s, e)) => (Some(s.clone()), Some(e.clone())),
                None => (None, None),
            };
            Shape::Range {
                start: start.clone(),
                end: end.clone(),
                start_doc_id,
                end_doc_id,
            }
        } else {
            Shape::Scan
        };

        Ok(QuerySpec {
            view: self.view.clone(),
            shape,
            reduce: self.reduce,
            include_docs: self.include_docs,
            order: self.order,
            skip: self.skip,
            limit: self.limit,
            group_level: self.group_level,
        })
    }
}
