//! Slash-separated locations inside the shared document tree.

use std::fmt;

use crate::ProtocolError;

/// Characters the document store refuses inside a key.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A location in the document tree, e.g. `rooms/4821/players/B`.
///
/// The empty path is the tree root. Paths are cheap to build by
/// chaining [`child`](Self::child):
///
/// ```rust
/// use roomlink_protocol::Path;
///
/// let seat = Path::root().child("rooms").child(4821).child("players").child("B");
/// assert_eq!(seat.to_string(), "rooms/4821/players/B");
/// assert_eq!(seat.parent().unwrap().to_string(), "rooms/4821/players");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The tree root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses `a/b/c`, rejecting empty or forbidden segments.
    ///
    /// Leading and trailing slashes are tolerated (`/rooms/` is `rooms`).
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for seg in trimmed.split('/') {
            if seg.is_empty() || seg.contains(FORBIDDEN) {
                return Err(ProtocolError::InvalidPath(raw.to_string()));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    /// Appends one segment.
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Appends every non-empty `/`-separated segment of a trusted string.
    pub fn join(&self, rest: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            rest.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    /// The enclosing path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// Last segment, or `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// `true` if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &Path) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// `true` if a write at one path can change the value seen at the other.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.contains(other) || other.contains(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
