//! Token adapter: turns a clang token dump into a Node tree
//!
//! Each non-blank line of the dump describes one token:
//!
//! ```text
//! identifier 'main' [StartOfLine] [3:5] ...
//! ```
//!
//! A line of that shape becomes `{"kind": .., "loc": {"line": .., "column": ..}}`.
//! Anything else is kept as `{"kind": <first word>, "raw": <line>}` so no
//! line of the dump is lost. The result is a Sequence that can be handed to
//! the canonicalizer like any other tree; note that `loc` is a volatile
//! field, so canonicalizing a token list leaves only the kinds.

use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::node::Node;
use crate::Result;

static TOKEN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>\w+) '\S+' .*?\[(?P<line>\d+):(?P<col>\d+)\].*$").unwrap()
});

/// One line of a token dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRecord {
    /// Line matched the `<kind> '<spelling>' ... [<line>:<column>]` shape
    Located { kind: String, line: u64, column: u64 },
    /// Line kept verbatim, with its first word as the kind
    Raw { kind: String, raw: String },
}

impl TokenRecord {
    pub fn kind(&self) -> &str {
        match self {
            TokenRecord::Located { kind, .. } | TokenRecord::Raw { kind, .. } => kind,
        }
    }

    pub fn to_node(&self) -> Node {
        match self {
            TokenRecord::Located { kind, line, column } => Node::record([
                ("kind", Node::from(kind.as_str())),
                (
                    "loc",
                    Node::record([("line", Node::from(*line)), ("column", Node::from(*column))]),
                ),
            ]),
            TokenRecord::Raw { kind, raw } => Node::record([
                ("kind", Node::from(kind.as_str())),
                ("raw", Node::from(raw.as_str())),
            ]),
        }
    }
}

/// Parse one dump line. Surrounding whitespace is ignored; blank lines
/// yield `None`.
pub fn parse_line(line: &str) -> Option<TokenRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match_located(line).unwrap_or_else(|| TokenRecord::Raw {
        kind: line.split(' ').next().unwrap_or(line).to_string(),
        raw: line.to_string(),
    }))
}

// Positions too large for u64 fall back to the raw form
fn match_located(line: &str) -> Option<TokenRecord> {
    let caps = TOKEN_LINE.captures(line)?;
    Some(TokenRecord::Located {
        kind: caps["kind"].to_string(),
        line: caps["line"].parse().ok()?,
        column: caps["col"].parse().ok()?,
    })
}

/// Parse a whole dump, one token per non-blank line
///
/// # Errors
/// `Io` if reading fails or the input is not UTF-8.
pub fn parse_dump<R: BufRead>(reader: R) -> Result<Vec<TokenRecord>> {
    let mut tokens = Vec::new();
    for line in reader.lines() {
        if let Some(token) = parse_line(&line?) {
            tokens.push(token);
        }
    }
    let raw = tokens
        .iter()
        .filter(|t| matches!(t, TokenRecord::Raw { .. }))
        .count();
    debug!(tokens = tokens.len(), raw, "parsed token dump");
    Ok(tokens)
}

/// The token list as a Sequence of Records
pub fn tokens_to_node(tokens: &[TokenRecord]) -> Node {
    Node::sequence(tokens.iter().map(TokenRecord::to_node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_located_line() {
        let token = parse_line("identifier 'main' [StartOfLine] [3:5] Loc=<a.c>").unwrap();
        assert_eq!(
            token,
            TokenRecord::Located {
                kind: "identifier".into(),
                line: 3,
                column: 5
            }
        );
        assert_eq!(
            token.to_node().to_string(),
            r#"{"kind":"identifier","loc":{"line":3,"column":5}}"#
        );
    }

    #[test]
    fn test_first_bracket_pair_with_position_wins() {
        let token = parse_line("int 'int' [LeadingSpace] [1:1] [9:9]").unwrap();
        assert_eq!(
            token,
            TokenRecord::Located {
                kind: "int".into(),
                line: 1,
                column: 1
            }
        );
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let token = parse_line("   semi ';' [7:12]\t ").unwrap();
        assert_eq!(token.kind(), "semi");
        assert!(matches!(token, TokenRecord::Located { line: 7, column: 12, .. }));
    }

    #[test]
    fn test_fallback_keeps_raw_line() {
        let token = parse_line("eof '' Loc=<a.c:4:1>").unwrap();
        assert_eq!(
            token,
            TokenRecord::Raw {
                kind: "eof".into(),
                raw: "eof '' Loc=<a.c:4:1>".into()
            }
        );
        assert_eq!(
            token.to_node().to_string(),
            r#"{"kind":"eof","raw":"eof '' Loc=<a.c:4:1>"}"#
        );
    }

    #[test]
    fn test_fallback_single_word() {
        let token = parse_line("garbage").unwrap();
        assert_eq!(token.kind(), "garbage");
    }

    #[test]
    fn test_overflowing_position_falls_back() {
        let line = "numeric_constant '1' [99999999999999999999999:1]";
        assert_eq!(
            parse_line(line),
            Some(TokenRecord::Raw {
                kind: "numeric_constant".into(),
                raw: line.into()
            })
        );
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   \t"), None);
    }

    #[test]
    fn test_parse_dump() {
        let dump = "int 'int' [StartOfLine] [1:1]\n\nidentifier 'x' [LeadingSpace] [1:5]\r\nsomething odd\n";
        let tokens = parse_dump(dump.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].kind(), "something");
        assert_eq!(
            tokens_to_node(&tokens).to_string(),
            r#"[{"kind":"int","loc":{"line":1,"column":1}},{"kind":"identifier","loc":{"line":1,"column":5}},{"kind":"something","raw":"something odd"}]"#
        );
    }

    #[test]
    fn test_parse_dump_rejects_invalid_utf8() {
        let err = parse_dump(&b"int 'int' [1:1]\n\xff\xfe\n"[..]).unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)), "got {:?}", err);
    }

    #[test]
    fn test_canonical_tokens_keep_only_kinds() {
        let tokens = parse_dump("b 'b' [2:1]\na 'a' [1:1]\n".as_bytes()).unwrap();
        let canonical = crate::canonicalize(&tokens_to_node(&tokens));
        // Not a child container: order is kept, locations are dropped
        assert_eq!(canonical.to_string(), r#"[{"kind":"b"},{"kind":"a"}]"#);
    }
}
