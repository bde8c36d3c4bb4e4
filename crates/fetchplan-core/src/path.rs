//! Dotted property paths used for plan-node identity and walk diagnostics.


use serde::Serialize;
use std::fmt;

///
/// PropertyPath
///
/// Immutable chain of path segments. `append` returns a new path; two paths
/// are equal iff their segment sequences are equal.
///

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(into = "String")]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Synthetic segment addressing a non-encapsulated identifier.
    pub const IDENTIFIER_SEGMENT: &'static str = "<id>";

    /// Synthetic segment addressing a collection's elements.
    pub const ELEMENTS_SEGMENT: &'static str = "<elements>";

    /// Synthetic segment addressing a collection's index.
    pub const INDEX_SEGMENT: &'static str = "<index>";

    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    #[must_use]
    pub fn append(&self, name: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name.into());

        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(Self {
                segments: self.segments[..n - 1].to_vec(),
            }),
        }
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn full_path(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

impl From<PropertyPath> for String {
    fn from(path: PropertyPath) -> Self {
        path.full_path()
    }
}
