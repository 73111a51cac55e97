//! Parser for the string form of a path.
//!
//! Grammar, loosely:
//!
//! ```text
//! path    := segment? ( '.' ident | '[' bracket ']' )*
//! segment := ident | '[' bracket ']'
//! bracket := index | '_key==' quoted | quoted
//! ```

use std::str::FromStr;

use crate::types::{Path, PathSegment};
use crate::PathError;

/// Maximum allowed path depth.
const MAX_PATH_LENGTH: usize = 256;

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), PathError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(found) => Err(PathError::UnexpectedChar {
                found,
                pos: self.pos - 1,
            }),
            None => Err(PathError::UnexpectedEnd),
        }
    }

    fn ident(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return match self.peek() {
                Some(found) => Err(PathError::UnexpectedChar { found, pos: self.pos }),
                None => Err(PathError::UnexpectedEnd),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self) -> Result<String, PathError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(PathError::UnexpectedEnd),
                },
                Some(c) => out.push(c),
                None => return Err(PathError::UnexpectedEnd),
            }
        }
    }

    fn bracket(&mut self) -> Result<PathSegment, PathError> {
        self.expect('[')?;
        let segment = match self.peek() {
            Some('"') => PathSegment::Key(self.quoted()?),
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let idx = digits
                    .parse::<usize>()
                    .map_err(|_| PathError::InvalidIndex(digits.clone()))?;
                PathSegment::Index(idx)
            }
            Some('_') => {
                let name = self.ident()?;
                if name != "_key" {
                    return Err(PathError::UnsupportedFilter(name));
                }
                self.expect('=')?;
                self.expect('=')?;
                PathSegment::Keyed { key: self.quoted()? }
            }
            Some(found) => {
                return Err(PathError::UnexpectedChar {
                    found,
                    pos: self.pos,
                })
            }
            None => return Err(PathError::UnexpectedEnd),
        };
        self.expect(']')?;
        Ok(segment)
    }

    fn parse(mut self) -> Result<Path, PathError> {
        let mut segments = Vec::new();
        if self.src.is_empty() {
            return Ok(Path::root());
        }
        match self.peek() {
            Some('[') => segments.push(self.bracket()?),
            _ => segments.push(PathSegment::Key(self.ident()?)),
        }
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(PathSegment::Key(self.ident()?));
                }
                '[' => segments.push(self.bracket()?),
                found => {
                    return Err(PathError::UnexpectedChar {
                        found,
                        pos: self.pos,
                    })
                }
            }
            if segments.len() > MAX_PATH_LENGTH {
                return Err(PathError::PathTooLong);
            }
        }
        Ok(Path::new(segments))
    }
}

/// Parse the string form of a path, e.g. `body[_key=="a1"].children[0].text`.
pub fn parse_path(src: &str) -> Result<Path, PathError> {
    Parser::new(src).parse()
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}
