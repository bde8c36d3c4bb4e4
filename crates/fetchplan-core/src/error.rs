use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured engine error with a stable classification.
/// None of these are recoverable inside the engine; callers match on
/// `class` to tell a broken walk contract from a shape that is not supported.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Diagnostic walk path active when the error was raised, if any.
    pub path: Option<String>,
}

impl InternalError {
    /// Construct an InternalError without path context.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            path: None,
        }
    }

    /// Construct a walk-protocol violation raised by the walk controller.
    pub(crate) fn walk_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::WalkProtocol, ErrorOrigin::Walk, message)
    }

    /// Construct a walk-protocol violation raised inside an identifier subtree.
    pub(crate) fn identifier_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::WalkProtocol, ErrorOrigin::Identifier, message)
    }

    /// Construct a resolve-time protocol violation (cycles, phase misuse).
    pub(crate) fn resolve_protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::WalkProtocol, ErrorOrigin::Resolve, message)
    }

    /// Construct an unsupported-shape error for one origin.
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct a metadata lookup failure.
    pub(crate) fn metadata_lookup(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::MetadataLookup, ErrorOrigin::Metadata, message)
    }

    /// Construct a single-assignment violation.
    pub(crate) fn double_injection(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::DoubleInjection, origin, message)
    }

    /// Construct a row-state error raised while hydrating or resolving.
    pub(crate) fn invalid_row(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidRow, ErrorOrigin::Resolve, message)
    }

    /// Construct a configuration failure.
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Configuration, ErrorOrigin::Config, message)
    }

    /// Attach the diagnostic walk path, keeping any path already recorded.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }

    #[must_use]
    pub const fn is_walk_protocol(&self) -> bool {
        matches!(self.class, ErrorClass::WalkProtocol)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub const fn is_metadata_lookup(&self) -> bool {
        matches!(self.class, ErrorClass::MetadataLookup)
    }

    #[must_use]
    pub const fn is_double_injection(&self) -> bool {
        matches!(self.class, ErrorClass::DoubleInjection)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        match &self.path {
            Some(path) => format!("{}:{}: {} (at {path})", self.origin, self.class, self.message),
            None => format!("{}:{}: {}", self.origin, self.class, self.message),
        }
    }
}

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Configuration,
    DoubleInjection,
    InvalidRow,
    MetadataLookup,
    Unsupported,
    WalkProtocol,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::DoubleInjection => "double_injection",
            Self::InvalidRow => "invalid_row",
            Self::MetadataLookup => "metadata_lookup",
            Self::Unsupported => "unsupported",
            Self::WalkProtocol => "walk_protocol",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Config,
    Identifier,
    Metadata,
    Resolve,
    Walk,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::Identifier => "identifier",
            Self::Metadata => "metadata",
            Self::Resolve => "resolve",
            Self::Walk => "walk",
        };
        write!(f, "{label}")
    }
}
