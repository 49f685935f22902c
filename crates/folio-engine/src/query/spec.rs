//! Immutable query specifications and result rows

use folio_core::{Document, EmitKey};
use serde_json::Value as Json;

/// Scan direction token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending key order (the default)
    #[default]
    Ascending,
    /// Descending key order
    Descending,
}

/// The key-bound shape of a query
///
/// Shapes are mutually exclusive; the builder resolves interleavings by
/// precedence: key > keys > prefix > range > scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// No key bound: every row of the view
    Scan,
    /// Exactly one emit key
    Key(EmitKey),
    /// A set of exact emit keys
    ///
    /// Accepted by the builder; the executor rejects it at query time.
    Keys(Vec<EmitKey>),
    /// Every row whose emit key starts with the prefix
    Prefix(EmitKey),
    /// The half-open interval `[start, end)` in emit-key order
    Range {
        /// Inclusive lower emit key
        start: EmitKey,
        /// Exclusive upper emit key
        end: EmitKey,
        /// Optional doc-id refinement of the lower edge
        start_doc_id: Option<String>,
        /// Optional doc-id refinement of the upper edge
        end_doc_id: Option<String>,
    },
}

impl Shape {
    /// The shape's kind tag (`"scan"`, `"key"`, `"keys"`, `"prefix"`, `"range"`)
    pub const fn kind(&self) -> &'static str {
        match self {
            Shape::Scan => "scan",
            Shape::Key(_) => "key",
            Shape::Keys(_) => "keys",
            Shape::Prefix(_) => "prefix",
            Shape::Range { .. } => "range",
        }
    }
}

/// A fully materialized query
///
/// Produced by [`Query::params`](crate::Query::params); consumed by the
/// executor. Defaults: map path (no reduce), no documents, ascending, no
/// skip, unbounded limit, no group level.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Name of the queried view
    pub view: String,
    /// Key-bound shape
    pub shape: Shape,
    /// Run the view's reduce function over the selected rows
    pub reduce: bool,
    /// Attach the stored document snapshot to each map row
    pub include_docs: bool,
    /// Scan direction
    pub order: Order,
    /// Rows (or groups, under reduce) to drop from the front
    pub skip: usize,
    /// Maximum rows (or groups) to yield; `None` is unbounded
    pub limit: Option<usize>,
    /// Reduction grouping: `None` reduces everything into one bucket,
    /// `Some(0)` groups by the whole emit key, `Some(n)` by its first `n`
    /// parts
    pub group_level: Option<usize>,
}

/// One query result row
///
/// Map rows carry `key`, `id`, `value`, and (when requested) `doc`.
/// Reduce rows carry `key` (`None` for the reduce-all group) and `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Emit key (map row) or group key (reduce row; `None` = all rows)
    pub key: Option<EmitKey>,
    /// Id of the emitting document; absent on reduce rows
    pub id: Option<String>,
    /// Emitted value (map row) or reduction result (reduce row)
    pub value: Json,
    /// Document snapshot stored alongside the row, when `include_docs` is set
    pub doc: Option<Document>,
}
