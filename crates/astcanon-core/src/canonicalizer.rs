//! Canonicalizer: rewrites a Node tree into its canonical form
//!
//! Two AST dumps of the same program rarely match byte for byte: node ids
//! are addresses, source ranges move with whitespace, and some frontends
//! emit children in whatever order their internal maps produce. The
//! canonicalizer removes that noise.
//!
//! # Pipeline
//!
//! `JSON text → Node → canonicalize → compact JSON / sort key → SHA-256`
//!
//! # Rules
//!
//! 1. Fields named in [`VOLATILE_FIELDS`] are dropped from every Record.
//! 2. Every other field is canonicalized and kept under its name, in the
//!    order it was read.
//! 3. A Sequence under a name from [`CHILD_CONTAINER_FIELDS`] is sorted by
//!    the [`sort_key`] of its canonicalized elements.
//! 4. Any other Sequence keeps its order (operands, parameters).
//! 5. Scalars are returned as they are.
//!
//! # Guarantees
//!
//! - **Idempotent**: `canonicalize(canonicalize(x)) == canonicalize(x)`
//! - **Deterministic**: same input always produces same output
//! - **Pure**: the input tree is borrowed and never modified

use std::collections::BTreeSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::node::{Node, Scalar};
use crate::{Error, Result};

/// Fields whose values depend on allocation, layout or emission context
pub const VOLATILE_FIELDS: &[&str] = &["id", "addr", "range", "loc", "parent", "prevDecl"];

/// Fields holding child lists whose order carries no meaning
pub const CHILD_CONTAINER_FIELDS: &[&str] = &["inner", "children", "stmts", "declarations", "body"];

static DEFAULT_CANONICALIZER: Lazy<Canonicalizer> = Lazy::new(Canonicalizer::default);

// ── Public API ─────────────────────────────────────────────

/// Canonicalize with the default field tables
pub fn canonicalize(node: &Node) -> Node {
    DEFAULT_CANONICALIZER.canonicalize(node)
}

/// Canonical compact JSON with the default field tables
pub fn canonical_json(node: &Node) -> Result<String> {
    DEFAULT_CANONICALIZER.canonical_json(node)
}

/// Semantic hash with the default field tables
pub fn semantic_hash(node: &Node) -> String {
    DEFAULT_CANONICALIZER.semantic_hash(node)
}

/// Canonical equality with the default field tables
pub fn equivalent(a: &Node, b: &Node) -> bool {
    DEFAULT_CANONICALIZER.equivalent(a, b)
}

// ── Configuration ──────────────────────────────────────────

/// Which field names are noise and which lists may be reordered.
///
/// `Default` is built from [`VOLATILE_FIELDS`] and
/// [`CHILD_CONTAINER_FIELDS`]. A name present in both sets is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalConfig {
    pub volatile_fields: BTreeSet<String>,
    pub child_containers: BTreeSet<String>,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        CanonicalConfig {
            volatile_fields: VOLATILE_FIELDS.iter().map(|s| s.to_string()).collect(),
            child_containers: CHILD_CONTAINER_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CanonicalConfig {
    /// Config with both tables empty; canonicalize becomes the identity
    pub fn empty() -> Self {
        CanonicalConfig {
            volatile_fields: BTreeSet::new(),
            child_containers: BTreeSet::new(),
        }
    }

    pub fn with_volatile_field(mut self, name: impl Into<String>) -> Self {
        self.volatile_fields.insert(name.into());
        self
    }

    pub fn with_child_container(mut self, name: impl Into<String>) -> Self {
        self.child_containers.insert(name.into());
        self
    }

    pub fn is_volatile(&self, name: &str) -> bool {
        self.volatile_fields.contains(name)
    }

    pub fn is_child_container(&self, name: &str) -> bool {
        self.child_containers.contains(name)
    }
}

// ── Canonicalizer ──────────────────────────────────────────

/// Applies one [`CanonicalConfig`]. Holds no other state, so a single
/// instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    config: CanonicalConfig,
}

impl Canonicalizer {
    pub fn new(config: CanonicalConfig) -> Self {
        Canonicalizer { config }
    }

    pub fn config(&self) -> &CanonicalConfig {
        &self.config
    }

    /// Build the canonical form of `node` as a new tree
    pub fn canonicalize(&self, node: &Node) -> Node {
        match node {
            Node::Record(fields) => Node::Record(self.canonicalize_record(fields)),
            Node::Sequence(items) => {
                Node::Sequence(items.iter().map(|item| self.canonicalize(item)).collect())
            }
            Node::Scalar(scalar) => Node::Scalar(scalar.clone()),
        }
    }

    /// Canonicalize and encode as compact JSON, non-ASCII left as is
    ///
    /// # Errors
    /// `SerializationError` if the encoder rejects the tree.
    pub fn canonical_json(&self, node: &Node) -> Result<String> {
        let canonical = self.canonicalize(node);
        serde_json::to_string(&canonical).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Lowercase hex SHA-256 over the sort key of the canonical tree.
    ///
    /// The sort key lists record fields by name, so two trees hash alike
    /// exactly when they are [`equivalent`](Self::equivalent).
    pub fn semantic_hash(&self, node: &Node) -> String {
        let key = sort_key(&self.canonicalize(node));
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        debug!(bytes = key.len(), %hash, "computed semantic hash");
        hash
    }

    /// Deep equality of the canonical forms. Record fields compare by name,
    /// sequences by position, numbers by value (`1.50` equals `1.5`, `-0`
    /// equals `0`). Agrees with [`semantic_hash`](Self::semantic_hash).
    pub fn equivalent(&self, a: &Node, b: &Node) -> bool {
        sort_key(&self.canonicalize(a)) == sort_key(&self.canonicalize(b))
    }

    fn canonicalize_record(&self, fields: &IndexMap<String, Node>) -> IndexMap<String, Node> {
        let mut out = IndexMap::with_capacity(fields.len());
        for (name, value) in fields {
            if self.config.is_volatile(name) {
                continue;
            }
            let value = match value {
                Node::Sequence(items) if self.config.is_child_container(name) => {
                    Node::Sequence(self.order_children(name, items))
                }
                other => self.canonicalize(other),
            };
            out.insert(name.clone(), value);
        }
        out
    }

    fn order_children(&self, field: &str, items: &[Node]) -> Vec<Node> {
        let mut keyed: Vec<(String, Node)> = items
            .iter()
            .map(|item| {
                let canonical = self.canonicalize(item);
                (sort_key(&canonical), canonical)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        trace!(field, len = keyed.len(), "ordered child container");
        keyed.into_iter().map(|(_, node)| node).collect()
    }
}

// ── Sort Key Encoding ──────────────────────────────────────

/// Text a child is ordered by.
///
/// JSON with record fields sorted by name, `", "` and `": "` separators,
/// numbers spelled by value (see `write_number`), and every character
/// outside printable ASCII written as a `\uXXXX` escape (UTF-16 units).
/// Keys are pure ASCII, so byte order and character order agree.
pub fn sort_key(node: &Node) -> String {
    let mut out = String::new();
    write_sort_key(&mut out, node);
    out
}

fn write_sort_key(out: &mut String, node: &Node) {
    match node {
        Node::Record(fields) => {
            let mut entries: Vec<_> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (name, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_escaped_str(out, name);
                out.push_str(": ");
                write_sort_key(out, value);
            }
            out.push('}');
        }
        Node::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_sort_key(out, item);
            }
            out.push(']');
        }
        Node::Scalar(Scalar::Null) => out.push_str("null"),
        Node::Scalar(Scalar::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
        Node::Scalar(Scalar::Number(n)) => write_number(out, &n.to_string()),
        Node::Scalar(Scalar::String(s)) => write_escaped_str(out, s),
    }
}

/// Numbers are keyed by value the way a JSON dump of the parsed value
/// spells them: integers in full with `-0` as `0`, floats in shortest
/// round-trip form with a `.0` or a signed two-digit exponent
/// (`100000.0`, `1e+16`, `1e-05`), overflow as `Infinity`.
fn write_number(out: &mut String, text: &str) {
    if !text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        out.push_str(if text == "-0" { "0" } else { text });
        return;
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_infinite() => out.push_str(if f < 0.0 { "-Infinity" } else { "Infinity" }),
        Ok(f) => write_float(out, f),
        Err(_) => out.push_str(text),
    }
}

fn write_float(out: &mut String, f: f64) {
    // `{:e}` gives the shortest round-trip digits: `-1.25e-7`
    let sci = format!("{:e}", f);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = exp.parse::<i32>().unwrap_or(0) + 1;

    out.push_str(sign);
    if point <= -4 || point > 16 {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let e = point - 1;
        out.push_str(&format!("e{}{:02}", if e < 0 { '-' } else { '+' }, e.abs()));
    } else if point <= 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat(point.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let point = point as usize;
        if point < digits.len() {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        } else {
            out.push_str(&digits);
            out.push_str(&"0".repeat(point - digits.len()));
            out.push_str(".0");
        }
    }
}

fn write_escaped_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(c),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}
