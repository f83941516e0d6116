//! Traversal Path Parser (C7).
//!
//! Parses the mini path-expression grammar used to request a chain of
//! property hops from a starting node, e.g. `->containedInPlace->name` or
//! `<-containedInPlace{typeOf:City}`.
//!
//! ```text
//! path    := hop+
//! hop     := arrow IDENT filter?
//! arrow   := '->' | '<-'
//! filter  := '{' IDENT ':' IDENT '}'
//! ```

use thiserror::Error;

use crate::model::Direction;

/// An error parsing a traversal path expression, with 1-based column info.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraversalParseError {
    /// An unrecognized character appeared where a token was expected.
    #[error("unexpected character '{found}' at column {column}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// 1-based column.
        column: usize,
    },
    /// The input ended mid-token.
    #[error("unexpected end of input at column {column}")]
    UnexpectedEnd {
        /// 1-based column where input ran out.
        column: usize,
    },
    /// A specific token was required but something else (or nothing) was found.
    #[error("expected {expected} at column {column}")]
    ExpectedToken {
        /// What was expected, for the error message.
        expected: &'static str,
        /// 1-based column.
        column: usize,
    },
}

/// A filter constraining the node reached by one hop, e.g. `{typeOf:City}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    /// The property being constrained (commonly `typeOf`).
    pub property: String,
    /// The required value.
    pub value: String,
}

/// One `arrow property filter?` step in a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    /// Direction of this hop relative to the node it starts from.
    pub direction: Direction,
    /// The property label to follow.
    pub property: String,
    /// An optional constraint on the node(s) reached by this hop.
    pub filter: Option<NodeFilter>,
}

/// A fully parsed traversal path: an ordered chain of hops from an implicit
/// starting node (the request's subject).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TraversalPath {
    /// The hops to follow, in order.
    pub hops: Vec<Hop>,
}

/// The set of properties reachable from a node at a given traversal depth,
/// used by the resolver and dispatcher to cap expansion breadth.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    /// The distinct property names seen.
    pub properties: Vec<String>,
}

impl PropertySet {
    /// Adds a property name if not already present, preserving insertion order.
    pub fn insert(&mut self, property: impl Into<String>) {
        let property = property.into();
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
    }
}

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    _src: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            _src: src,
        }
    }

    fn col(&self) -> usize {
        self.pos + 1
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn expect_char(&mut self, expected: char) -> Result<(), TraversalParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(TraversalParseError::UnexpectedChar {
                found: c,
                column: self.pos,
            }),
            None => Err(TraversalParseError::UnexpectedEnd { column: self.col() }),
        }
    }

    fn parse_arrow(&mut self) -> Result<Direction, TraversalParseError> {
        match (self.peek(), self.peek_at(1)) {
            (Some('-'), Some('>')) => {
                self.bump();
                self.bump();
                Ok(Direction::Out)
            }
            (Some('<'), Some('-')) => {
                self.bump();
                self.bump();
                Ok(Direction::In)
            }
            (Some(c), _) => Err(TraversalParseError::UnexpectedChar {
                found: c,
                column: self.col(),
            }),
            (None, _) => Err(TraversalParseError::UnexpectedEnd { column: self.col() }),
        }
    }

    fn parse_ident(&mut self) -> Result<String, TraversalParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(TraversalParseError::UnexpectedChar {
                    found: c,
                    column: self.col(),
                }),
                None => Err(TraversalParseError::UnexpectedEnd { column: self.col() }),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_filter(&mut self) -> Result<Option<NodeFilter>, TraversalParseError> {
        if self.peek() != Some('{') {
            return Ok(None);
        }
        self.bump();
        let property = self.parse_ident()?;
        self.expect_char(':')?;
        let value = self.parse_ident()?;
        match self.bump() {
            Some('}') => Ok(Some(NodeFilter { property, value })),
            Some(c) => Err(TraversalParseError::UnexpectedChar {
                found: c,
                column: self.pos,
            }),
            None => Err(TraversalParseError::UnexpectedEnd { column: self.col() }),
        }
    }

    fn parse_hop(&mut self) -> Result<Hop, TraversalParseError> {
        let direction = self.parse_arrow()?;
        let property = self.parse_ident()?;
        let filter = self.parse_filter()?;
        Ok(Hop {
            direction,
            property,
            filter,
        })
    }
}

/// Parses a traversal path expression into an ordered chain of [`Hop`]s.
pub fn parse(src: &str) -> Result<TraversalPath, TraversalParseError> {
    let mut scanner = Scanner::new(src);
    let mut hops = Vec::new();
    if scanner.eof() {
        return Err(TraversalParseError::ExpectedToken {
            expected: "at least one hop",
            column: 1,
        });
    }
    while !scanner.eof() {
        hops.push(scanner.parse_hop()?);
    }
    Ok(TraversalPath { hops })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_outgoing_hop() {
        let arc = parse("->containedInPlace").unwrap();
        assert_eq!(arc.hops.len(), 1);
        assert_eq!(arc.hops[0].direction, Direction::Out);
        assert_eq!(arc.hops[0].property, "containedInPlace");
        assert!(arc.hops[0].filter.is_none());
    }

    #[test]
    fn parses_incoming_hop_with_filter() {
        let arc = parse("<-containedInPlace{typeOf:City}").unwrap();
        assert_eq!(arc.hops[0].direction, Direction::In);
        assert_eq!(
            arc.hops[0].filter,
            Some(NodeFilter {
                property: "typeOf".to_string(),
                value: "City".to_string()
            })
        );
    }

    #[test]
    fn parses_multi_hop_chain() {
        let arc = parse("->containedInPlace->name").unwrap();
        assert_eq!(arc.hops.len(), 2);
        assert_eq!(arc.hops[1].property, "name");
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse("").is_err());
    }

    #[test]
    fn rejects_missing_arrow() {
        let result = parse("containedInPlace");
        assert!(matches!(
            result,
            Err(TraversalParseError::UnexpectedChar { .. })
        ));
    }

    #[test]
    fn rejects_unterminated_filter() {
        let result = parse("->containedInPlace{typeOf:City");
        assert!(result.is_err());
    }
}
