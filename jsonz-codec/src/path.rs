//! Paths into a document
//!
//! A [`Path`] is a sequence of object keys and array indexes. Paths can be
//! built programmatically or parsed from JSON Pointer text (RFC 6901).

use std::fmt;

use jsonz_format::{JsonzError, Result};

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key; also accepted as an index when it is a canonical number
    Key(String),
    /// Array position
    Index(usize),
}

impl PathSegment {
    /// Array index this segment denotes, if any
    ///
    /// Pointer tokens are numeric only in canonical form (`0`, `17`, not `017`).
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(idx) => Some(*idx),
            PathSegment::Key(key) => {
                let canonical = key == "0" || (!key.starts_with('0') && !key.is_empty());
                if canonical && key.bytes().all(|b| b.is_ascii_digit()) {
                    key.parse().ok()
                } else {
                    None
                }
            }
        }
    }

    /// Object key this segment denotes
    pub fn as_key(&self) -> std::borrow::Cow<'_, str> {
        match self {
            PathSegment::Key(key) => key.as_str().into(),
            PathSegment::Index(idx) => idx.to_string().into(),
        }
    }
}

/// Path from the document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The root path
    pub fn root() -> Self {
        Self::default()
    }

    /// Append an object key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an array index
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// Segments in walk order
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Prefix of the first `n` segments
    pub fn prefix(&self, n: usize) -> Path {
        Path {
            segments: self.segments[..n.min(self.segments.len())].to_vec(),
        }
    }

    /// Parse JSON Pointer text; the empty string is the root
    pub fn parse(pointer: &str) -> Result<Self> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(JsonzError::PathNotFound(format!(
                "'{}' must start with '/' (or be empty for the root)",
                pointer
            )));
        };

        let segments = rest
            .split('/')
            .map(|token| {
                validate_escapes(token).map_err(|reason| {
                    JsonzError::PathNotFound(format!("'{}': {}", pointer, reason))
                })?;
                Ok(PathSegment::Key(unescape_token(token)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", escape_token(&segment.as_key()))?;
        }
        Ok(())
    }
}

/// `~1` → `/`, then `~0` → `~`
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// `~` → `~0`, then `/` → `~1`
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn validate_escapes(token: &str) -> std::result::Result<(), String> {
    let mut chars = token.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') | Some('1') => {}
                Some(other) => return Err(format!("invalid escape sequence '~{}'", other)),
                None => return Err("incomplete escape sequence at end of token".to_string()),
            }
        }
    }
    Ok(())
}
