//! A small JSON path dialect for locating values in REST documents.
//!
//! Supported syntax:
//!
//! * `$` - the document root; every path starts with it
//! * `.name` - a member of an object
//! * `['name']` or `["name"]` - a member whose name contains characters like `.` or `[`
//! * `[N]` - element N of an array
//!
//! [`evaluate`] finds the value at a path; a JSON `null` counts as absent.  [`write`] places a
//! value at a path, creating the objects and arrays along the way, and is how request bodies are
//! built on apply.

use serde_json::{Map, Value};
use snafu::{ensure, OptionExt};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Invalid path '{}' at offset {}: {}", path, offset, msg))]
        Syntax {
            path: String,
            offset: usize,
            msg: String,
        },

        #[snafu(display("No value at '{}'", path))]
        NotFound { path: String },

        #[snafu(display("Cannot write '{}': '{}' is not {}", path, at, expected))]
        Conflict {
            path: String,
            at: String,
            expected: &'static str,
        },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "['{}']", key),
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Splits a path into its segments.
pub fn parse(path: &str) -> Result<Vec<Segment>> {
    let mut chars = path.char_indices().peekable();

    match chars.next() {
        Some((_, '$')) => {}
        _ => {
            return error::SyntaxSnafu {
                path,
                offset: 0usize,
                msg: "must start with '$'",
            }
            .fail()
        }
    }

    let mut segments = Vec::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            '.' => {
                let mut key = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    key.push(c);
                    chars.next();
                }
                ensure!(
                    !key.is_empty(),
                    error::SyntaxSnafu {
                        path,
                        offset,
                        msg: "empty member name",
                    }
                );
                segments.push(Segment::Key(key));
            }
            '[' => segments.push(parse_bracket(path, offset, &mut chars)?),
            other => {
                return error::SyntaxSnafu {
                    path,
                    offset,
                    msg: format!("unexpected character '{}'", other),
                }
                .fail()
            }
        }
    }

    trace!("Parsed path '{}' to segments {:?}", path, segments);
    Ok(segments)
}

// Called after the opening bracket; consumes through the closing bracket.
fn parse_bracket(
    path: &str,
    open: usize,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<Segment> {
    let segment = match chars.peek().map(|&(_, c)| c) {
        Some(quote @ '\'') | Some(quote @ '"') => {
            chars.next();
            let mut key = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == quote {
                    closed = true;
                    break;
                }
                key.push(c);
            }
            ensure!(
                closed,
                error::SyntaxSnafu {
                    path,
                    offset: open,
                    msg: "unbalanced quotes",
                }
            );
            Segment::Key(key)
        }
        Some(c) if c.is_ascii_digit() => {
            let mut digits = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                digits.push(c);
                chars.next();
            }
            let index = digits.parse::<usize>().ok().context(error::SyntaxSnafu {
                path,
                offset: open,
                msg: "array index too large",
            })?;
            Segment::Index(index)
        }
        _ => {
            return error::SyntaxSnafu {
                path,
                offset: open,
                msg: "expected array index or quoted member name",
            }
            .fail()
        }
    };

    match chars.next() {
        Some((_, ']')) => Ok(segment),
        _ => error::SyntaxSnafu {
            path,
            offset: open,
            msg: "expected ']'",
        }
        .fail(),
    }
}

/// Returns the value at `path`.  A missing member, an out-of-range index, indexing into the
/// wrong kind of value, and an explicit `null` are all `NotFound`.
pub fn evaluate<'a>(document: &'a Value, path: &str) -> Result<&'a Value> {
    let segments = parse(path)?;
    let mut current = document;
    for segment in &segments {
        let next = match segment {
            Segment::Key(key) => current.as_object().and_then(|map| map.get(key)),
            Segment::Index(index) => current.as_array().and_then(|array| array.get(*index)),
        };
        current = next.context(error::NotFoundSnafu { path })?;
    }
    ensure!(!current.is_null(), error::NotFoundSnafu { path });
    Ok(current)
}

/// Places `value` at `path` inside `document`, creating objects and arrays as needed.  Arrays
/// are padded with `null` up to the requested index.  Existing members and elements along the
/// way are kept.
pub fn write(document: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = parse(path)?;
    write_segments(document, &segments, value).map_err(|conflict| match conflict {
        Error::Conflict { at, expected, .. } => Error::Conflict {
            path: path.to_string(),
            at,
            expected,
        },
        other => other,
    })
}

/// Like [`write`], for a path that's already been split into segments.
pub fn write_segments(document: &mut Value, segments: &[Segment], value: Value) -> Result<()> {
    let mut current = document;
    let mut walked = String::from("$");
    for segment in segments {
        current = match segment {
            Segment::Key(key) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                match current {
                    Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                    _ => {
                        return error::ConflictSnafu {
                            path: segments_to_string(segments),
                            at: walked,
                            expected: "an object",
                        }
                        .fail()
                    }
                }
            }
            Segment::Index(index) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                match current {
                    Value::Array(array) => {
                        if array.len() <= *index {
                            array.resize(*index + 1, Value::Null);
                        }
                        &mut array[*index]
                    }
                    _ => {
                        return error::ConflictSnafu {
                            path: segments_to_string(segments),
                            at: walked,
                            expected: "an array",
                        }
                        .fail()
                    }
                }
            }
        };
        walked.push_str(&segment.to_string());
    }
    *current = value;
    Ok(())
}

/// Formats segments back into path syntax.
pub fn segments_to_string(segments: &[Segment]) -> String {
    let mut s = String::from("$");
    for segment in segments {
        s.push_str(&segment.to_string());
    }
    s
}
