//! Tuple keys for the Folio key layout
//!
//! Every persisted key is a tuple `(namespace, space, ...parts)`:
//! - `namespace` isolates databases sharing one backend
//! - `space` discriminates documents, view designs, view rows, and back-refs
//! - `parts` are ordered primitive values (`KeyPart`)
//!
//! # Ordering
//!
//! Keys are ordered by: namespace → space → parts
//!
//! This ordering is what makes a single ordered-prefix scan sufficient for
//! every supported query shape: all keys of a namespace are grouped together,
//! within a namespace they are grouped by space, and within a space they are
//! ordered lexicographically by their tuple parts.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// =============================================================================
// KeyPart - ordered primitive tuple part
// =============================================================================

/// A single ordered primitive part of a tuple key
///
/// Parts are totally ordered: first by type rank
/// (bytes < string < integer < float < boolean), then by value within the
/// type. Floats use IEEE 754 total ordering, so every part is comparable.
///
/// Integers and floats are distinct part types; `Int(1)` and `Float(1.0)`
/// are different keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyPart {
    /// A binary string
    Bytes(Vec<u8>),
    /// A UTF-8 string
    Str(String),
    /// A 64-bit signed integer
    Int(i64),
    /// A 64-bit float, ordered by `f64::total_cmp`
    Float(f64),
    /// A boolean
    Bool(bool),
}

impl KeyPart {
    /// Type rank used for cross-type ordering
    const fn rank(&self) -> u8 {
        match self {
            KeyPart::Bytes(_) => 0,
            KeyPart::Str(_) => 1,
            KeyPart::Int(_) => 2,
            KeyPart::Float(_) => 3,
            KeyPart::Bool(_) => 4,
        }
    }

    /// Borrow the string value, if this part is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => a.cmp(b),
            (KeyPart::Str(a), KeyPart::Str(b)) => a.cmp(b),
            (KeyPart::Int(a), KeyPart::Int(b)) => a.cmp(b),
            (KeyPart::Float(a), KeyPart::Float(b)) => a.total_cmp(b),
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            KeyPart::Bytes(b) => b.hash(state),
            KeyPart::Str(s) => s.hash(state),
            KeyPart::Int(i) => i.hash(state),
            // Hash the bit pattern so Hash agrees with total_cmp equality
            KeyPart::Float(f) => f.to_bits().hash(state),
            KeyPart::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            KeyPart::Str(s) => write!(f, "{:?}", s),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Float(x) => write!(f, "{}", x),
            KeyPart::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<bool> for KeyPart {
    fn from(v: bool) -> Self {
        KeyPart::Bool(v)
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        KeyPart::Int(v)
    }
}

impl From<i32> for KeyPart {
    fn from(v: i32) -> Self {
        KeyPart::Int(v as i64)
    }
}

impl From<u32> for KeyPart {
    fn from(v: u32) -> Self {
        KeyPart::Int(v as i64)
    }
}

impl From<f64> for KeyPart {
    fn from(v: f64) -> Self {
        KeyPart::Float(v)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        KeyPart::Str(v.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(v: String) -> Self {
        KeyPart::Str(v)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(v: Vec<u8>) -> Self {
        KeyPart::Bytes(v)
    }
}

// =============================================================================
// EmitKey - emit-key tuple
// =============================================================================

/// The key emitted by a view's map function
///
/// A tuple of [`KeyPart`]s participating in the store's lexicographic order.
/// A single primitive value converts to a one-element tuple, so
/// `emitter.emit("Alice")` and `emitter.emit(("Alice",))` are equivalent.
///
/// # Examples
///
/// ```
/// use folio_core::{EmitKey, KeyPart};
///
/// let single = EmitKey::from("Alice");
/// assert_eq!(single.parts().len(), 1);
///
/// let compound = EmitKey::from(("engineering", "Alice"));
/// assert_eq!(compound.parts().len(), 2);
/// assert!(single < EmitKey::from("Bob"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmitKey(Vec<KeyPart>);

impl EmitKey {
    /// Create an emit key from tuple parts
    pub fn new(parts: Vec<KeyPart>) -> Self {
        EmitKey(parts)
    }

    /// The tuple parts, in order
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Consume the key, returning its parts
    pub fn into_parts(self) -> Vec<KeyPart> {
        self.0
    }

    /// Number of tuple parts
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the tuple has no parts
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `n` parts as a new emit key (used for group levels)
    ///
    /// Returns the whole key when it has fewer than `n` parts.
    pub fn first_n(&self, n: usize) -> EmitKey {
        EmitKey(self.0.iter().take(n).cloned().collect())
    }
}

impl From<KeyPart> for EmitKey {
    fn from(part: KeyPart) -> Self {
        EmitKey(vec![part])
    }
}

impl From<Vec<KeyPart>> for EmitKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        EmitKey(parts)
    }
}

impl From<&str> for EmitKey {
    fn from(v: &str) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl From<String> for EmitKey {
    fn from(v: String) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl From<i64> for EmitKey {
    fn from(v: i64) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl From<i32> for EmitKey {
    fn from(v: i32) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl From<f64> for EmitKey {
    fn from(v: f64) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl From<bool> for EmitKey {
    fn from(v: bool) -> Self {
        EmitKey(vec![KeyPart::from(v)])
    }
}

impl<A: Into<KeyPart>> From<(A,)> for EmitKey {
    fn from(t: (A,)) -> Self {
        EmitKey(vec![t.0.into()])
    }
}

impl<A: Into<KeyPart>, B: Into<KeyPart>> From<(A, B)> for EmitKey {
    fn from(t: (A, B)) -> Self {
        EmitKey(vec![t.0.into(), t.1.into()])
    }
}

impl<A: Into<KeyPart>, B: Into<KeyPart>, C: Into<KeyPart>> From<(A, B, C)> for EmitKey {
    fn from(t: (A, B, C)) -> Self {
        EmitKey(vec![t.0.into(), t.1.into(), t.2.into()])
    }
}

impl<A: Into<KeyPart>, B: Into<KeyPart>, C: Into<KeyPart>, D: Into<KeyPart>> From<(A, B, C, D)>
    for EmitKey
{
    fn from(t: (A, B, C, D)) -> Self {
        EmitKey(vec![t.0.into(), t.1.into(), t.2.into(), t.3.into()])
    }
}

// =============================================================================
// KeySpace - key layout discriminator
// =============================================================================

/// Discriminates the four key families of the layout
///
/// Maps to the second tuple element of the persisted layout:
/// documents, view design records, view rows, and view back-references.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum KeySpace {
    /// Document bodies: `(N, "doc", D)`
    Doc,
    /// View design records: `(N, "design", V)`
    Design,
    /// View rows: `(N, "view", V, ...emit_key, D)`
    View,
    /// View back-references: `(N, "viewref", V, D)`
    ViewRef,
}

impl KeySpace {
    /// Canonical string form of the space tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            KeySpace::Doc => "doc",
            KeySpace::Design => "design",
            KeySpace::View => "view",
            KeySpace::ViewRef => "viewref",
        }
    }
}

impl fmt::Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Key - composite tuple key
// =============================================================================

/// Composite key addressing one entry in the ordered store
///
/// # Examples
///
/// ```
/// use folio_core::{EmitKey, Key};
///
/// let doc = Key::doc("default", "alice");
/// let prefix = Key::doc_prefix("default");
/// assert!(doc.starts_with(&prefix));
///
/// let row = Key::view_row("default", "by-name", &EmitKey::from("Alice"), "alice");
/// assert!(row.starts_with(&Key::view_prefix("default", "by-name")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Namespace scoping every key; two namespaces are fully isolated
    pub namespace: String,
    /// Key family within the namespace
    pub space: KeySpace,
    /// Remaining tuple parts
    pub parts: Vec<KeyPart>,
}

impl Key {
    /// Create a key from raw components
    pub fn new(namespace: impl Into<String>, space: KeySpace, parts: Vec<KeyPart>) -> Self {
        Self {
            namespace: namespace.into(),
            space,
            parts,
        }
    }

    /// Document key: `(N, "doc", D)`
    pub fn doc(namespace: impl Into<String>, doc_id: &str) -> Self {
        Self::new(namespace, KeySpace::Doc, vec![KeyPart::from(doc_id)])
    }

    /// Prefix matching every document in the namespace
    pub fn doc_prefix(namespace: impl Into<String>) -> Self {
        Self::new(namespace, KeySpace::Doc, vec![])
    }

    /// View design record key: `(N, "design", V)`
    pub fn design(namespace: impl Into<String>, view: &str) -> Self {
        Self::new(namespace, KeySpace::Design, vec![KeyPart::from(view)])
    }

    /// View row key: `(N, "view", V, ...emit_key, D)`
    pub fn view_row(
        namespace: impl Into<String>,
        view: &str,
        emit_key: &EmitKey,
        doc_id: &str,
    ) -> Self {
        let mut parts = Vec::with_capacity(emit_key.len() + 2);
        parts.push(KeyPart::from(view));
        parts.extend(emit_key.parts().iter().cloned());
        parts.push(KeyPart::from(doc_id));
        Self::new(namespace, KeySpace::View, parts)
    }

    /// Prefix matching every row of a view
    pub fn view_prefix(namespace: impl Into<String>, view: &str) -> Self {
        Self::new(namespace, KeySpace::View, vec![KeyPart::from(view)])
    }

    /// Prefix matching the rows of a view whose emit key starts with `emit_key`
    ///
    /// With a full emit key this addresses the exact-key query shape (all
    /// rows for that key, across documents).
    pub fn view_row_prefix(
        namespace: impl Into<String>,
        view: &str,
        emit_key: &EmitKey,
    ) -> Self {
        let mut parts = Vec::with_capacity(emit_key.len() + 1);
        parts.push(KeyPart::from(view));
        parts.extend(emit_key.parts().iter().cloned());
        Self::new(namespace, KeySpace::View, parts)
    }

    /// Range bound over view rows: `(N, "view", V, ...emit_key[, doc_id])`
    ///
    /// The optional doc id refines the bound within rows sharing the same
    /// emit key.
    pub fn view_row_bound(
        namespace: impl Into<String>,
        view: &str,
        emit_key: &EmitKey,
        doc_id: Option<&str>,
    ) -> Self {
        let mut parts = Vec::with_capacity(emit_key.len() + 2);
        parts.push(KeyPart::from(view));
        parts.extend(emit_key.parts().iter().cloned());
        if let Some(id) = doc_id {
            parts.push(KeyPart::from(id));
        }
        Self::new(namespace, KeySpace::View, parts)
    }

    /// Back-reference key: `(N, "viewref", V, D)`
    ///
    /// Back-ref keys always end with the exact document id string.
    pub fn view_ref(namespace: impl Into<String>, view: &str, doc_id: &str) -> Self {
        Self::new(
            namespace,
            KeySpace::ViewRef,
            vec![KeyPart::from(view), KeyPart::from(doc_id)],
        )
    }

    /// Prefix matching every back-reference of a view
    pub fn view_ref_prefix(namespace: impl Into<String>, view: &str) -> Self {
        Self::new(namespace, KeySpace::ViewRef, vec![KeyPart::from(view)])
    }

    /// Check if this key starts with the given prefix
    ///
    /// Namespace and space must match exactly; the prefix's parts must be a
    /// prefix of this key's parts. This drives ordered prefix scans.
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.namespace == prefix.namespace
            && self.space == prefix.space
            && self.parts.len() >= prefix.parts.len()
            && self.parts[..prefix.parts.len()] == prefix.parts[..]
    }

    /// Decompose a view-row key into `(emit_key, doc_id)`
    ///
    /// Returns `None` for keys outside the view space or without the
    /// `view name ... doc id` envelope.
    pub fn view_row_parts(&self) -> Option<(EmitKey, &str)> {
        if self.space != KeySpace::View || self.parts.len() < 2 {
            return None;
        }
        let doc_id = self.parts.last()?.as_str()?;
        let emit = EmitKey::new(self.parts[1..self.parts.len() - 1].to_vec());
        Some((emit, doc_id))
    }

    /// The trailing document id of a document key
    pub fn doc_id(&self) -> Option<&str> {
        match self.space {
            KeySpace::Doc => self.parts.last()?.as_str(),
            _ => None,
        }
    }
}

/// Ordering implementation for the ordered store
///
/// Keys are ordered by: namespace → space → parts.
impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace
            .cmp(&other.namespace)
            .then(self.space.cmp(&other.space))
            .then_with(|| self.parts.cmp(&other.parts))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}", self.namespace, self.space)?;
        for part in &self.parts {
            write!(f, ", {}", part)?;
        }
        write!(f, ")")
    }
}
