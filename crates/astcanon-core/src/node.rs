//! Node, the tree shape every canonicalization works on
//!
//! A node is exactly one of Record, Sequence or Scalar. Producers
//! (a compiler's JSON AST dump, the token adapter) build it; the
//! canonicalizer consumes it and returns a fresh one.
//!
//! Records keep their fields in the order they were read, so a tree that
//! goes in and out untouched is reproduced field for field.

use std::fmt;
use std::io;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::UNSUPPORTED_SHAPE;
use crate::Result;

// ── Core Types ────────────────────────────────────────────

/// A leaf value, carried through canonicalization untouched
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    /// The number exactly as written: `1`, `1.0`, `-0` and integers past
    /// 64 bits all keep their spelling
    Number(serde_json::Number),
    String(String),
}

/// One element of a structured-data tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Field name → value, in encounter order
    Record(IndexMap<String, Node>),
    /// Ordered list of values
    Sequence(Vec<Node>),
    /// Leaf value
    Scalar(Scalar),
}

impl Node {
    /// Build a Record from `(name, value)` pairs. A repeated name keeps its
    /// first position and its last value.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence<I: IntoIterator<Item = Node>>(items: I) -> Self {
        Node::Sequence(items.into_iter().collect())
    }

    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    /// Shape name for logs and error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Record(_) => "Record",
            Node::Sequence(_) => "Sequence",
            Node::Scalar(_) => "Scalar",
        }
    }

    /// Field lookup; `None` for non-records and missing fields
    pub fn get(&self, field: &str) -> Option<&Node> {
        match self {
            Node::Record(fields) => fields.get(field),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Convert from serde_json::Value, keeping object field order
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Node::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Node::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => Node::Scalar(Scalar::Number(n.clone())),
            serde_json::Value::String(s) => Node::Scalar(Scalar::String(s.clone())),
            serde_json::Value::Array(arr) => Node::Sequence(arr.iter().map(Node::from_json).collect()),
            serde_json::Value::Object(map) => Node::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), Node::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Node::Scalar(Scalar::Null) => serde_json::Value::Null,
            Node::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Node::Scalar(Scalar::Number(n)) => serde_json::Value::Number(n.clone()),
            Node::Scalar(Scalar::String(s)) => serde_json::Value::String(s.clone()),
            Node::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Node::to_json).collect())
            }
            Node::Record(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Read exactly one JSON document.
    ///
    /// The nesting limit of the JSON reader is lifted: AST dumps of long
    /// `else if` chains routinely nest deeper than its default of 128.
    ///
    /// # Errors
    /// `ParseError` for malformed or trailing input, `UnsupportedShape` for
    /// values outside the Record/Sequence/Scalar family, `Io` when reading
    /// fails.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Node> {
        let mut de = serde_json::Deserializer::from_reader(reader);
        de.disable_recursion_limit();
        let node = Node::deserialize(&mut de)?;
        de.end()?;
        Ok(node)
    }
}

impl FromStr for Node {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Node> {
        let mut de = serde_json::Deserializer::from_str(s);
        de.disable_recursion_limit();
        let node = Node::deserialize(&mut de)?;
        de.end()?;
        Ok(node)
    }
}

impl fmt::Display for Node {
    /// Compact JSON
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

// ── Conversions ───────────────────────────────────────────

impl From<Scalar> for Node {
    fn from(s: Scalar) -> Self {
        Node::Scalar(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Scalar(Scalar::Number(i.into()))
    }
}

impl From<u64> for Node {
    fn from(u: u64) -> Self {
        Node::Scalar(Scalar::Number(u.into()))
    }
}

impl From<f64> for Node {
    /// Non-finite floats have no JSON spelling and become null
    fn from(f: f64) -> Self {
        serde_json::Number::from_f64(f)
            .map(|n| Node::Scalar(Scalar::Number(n)))
            .unwrap_or_else(Node::null)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Scalar::String(s))
    }
}

// ── Serde ─────────────────────────────────────────────────

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Node::Sequence(items) => serializer.collect_seq(items),
            Node::Scalar(s) => s.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Node, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

/// Field name serde_json uses to hand a number over as its source text.
/// The JSON reader presents every number that is not a plain 64-bit integer
/// as a one-entry map under this name; it is not part of serde_json's public
/// API, so a rename there is caught by the number spelling tests below.
const SERDE_JSON_NUMBER_FIELD: &str = "$serde_json::private::Number";

/// Accepts the JSON data model and nothing else. Shapes outside it are
/// reported with the `unsupported shape` prefix instead of being coerced.
struct NodeVisitor;

fn unsupported<E: de::Error>(what: &str) -> E {
    E::custom(format!("{}: {}", UNSUPPORTED_SHAPE, what))
}

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a mapping, a list, a string, a number, a boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(v.into())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::Number(v.into())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Node, E> {
        serde_json::Number::from_f64(v)
            .map(|n| Node::Scalar(Scalar::Number(n)))
            .ok_or_else(|| unsupported(&format!("non-finite number {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(Scalar::String(v)))
    }

    fn visit_bytes<E: de::Error>(self, _v: &[u8]) -> std::result::Result<Node, E> {
        Err(unsupported("byte string"))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::null())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Node>()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Node, A::Error> {
        let mut fields = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        let first = match map.next_key::<String>()? {
            Some(name) => name,
            None => return Ok(Node::Record(fields)),
        };
        if first == SERDE_JSON_NUMBER_FIELD {
            let text = map.next_value::<String>()?;
            return text
                .parse::<serde_json::Number>()
                .map(|n| Node::Scalar(Scalar::Number(n)))
                .map_err(|_| unsupported(&format!("number text {:?}", text)));
        }
        fields.insert(first, map.next_value::<Node>()?);
        while let Some((name, value)) = map.next_entry::<String, Node>()? {
            fields.insert(name, value);
        }
        Ok(Node::Record(fields))
    }

    fn visit_enum<A: EnumAccess<'de>>(self, _data: A) -> std::result::Result<Node, A::Error> {
        Err(unsupported("enum variant"))
    }
}
