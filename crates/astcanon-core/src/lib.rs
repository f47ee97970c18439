//! astcanon core - canonical form for compiler AST dumps
//!
//! Two dumps of the same program differ in node ids, source ranges and
//! sometimes in the order children are emitted. This crate rewrites a dump
//! into a canonical tree so that a plain equality check tells whether the
//! two describe the same structure.
//!
//! # Architecture
//!
//! ```text
//! AST JSON ──→ Node ──→ Canonicalizer ──→ canonical JSON / semantic hash
//!                ↑
//! token dump ──→ tokens
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: same input always produces identical output
//! - **Idempotent**: canonicalizing a canonical tree changes nothing
//! - **Pure**: input trees are never mutated
//!
//! # Example
//! ```
//! let node: astcanon_core::Node = r#"{"kind":"X","id":42,"inner":[{"kind":"B"},{"kind":"A"}]}"#
//!     .parse()
//!     .unwrap();
//! let out = astcanon_core::canonical_json(&node).unwrap();
//! assert_eq!(out, r#"{"kind":"X","inner":[{"kind":"A"},{"kind":"B"}]}"#);
//! ```

pub mod canonicalizer;
pub mod error;
pub mod node;
pub mod tokens;

pub use canonicalizer::{
    canonical_json, canonicalize, equivalent, semantic_hash, sort_key, CanonicalConfig,
    Canonicalizer, CHILD_CONTAINER_FIELDS, VOLATILE_FIELDS,
};
pub use error::{Error, Result};
pub use node::{Node, Scalar};
pub use tokens::{parse_dump, parse_line, tokens_to_node, TokenRecord};

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
