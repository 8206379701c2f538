//! Constraint violations raised by the hierarchy engine.
//!
//! Every variant is a pre-commit violation: the operation that raised it has
//! left the warehouse unchanged, and retrying with the same input fails the
//! same way. Messages carry package and location names so they can be shown
//! to operators verbatim.

use crate::error::ErrorCode;

/// Errors that can occur in hierarchy operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// A package would end up among its own ancestors.
    #[error("proposed hierarchy would result in a package loop involving {}", .packages.join(", "))]
    Loop { packages: Vec<String> },

    /// A tree would become deeper than the warehouse allows.
    #[error(
        "package '{package}' would reach depth {depth}, exceeding the maximum permitted depth of {max_depth}"
    )]
    DepthExceeded {
        package: String,
        depth: u32,
        max_depth: u32,
    },

    /// The contents of one package tree span several locations.
    #[error("package '{package}' cannot be in multiple locations: {}", .locations.join(", "))]
    MultiLocation {
        package: String,
        locations: Vec<String>,
    },

    /// Links propose to move one package to several different packages.
    #[error("links are proposing to move package '{child}' to several different packages")]
    LinkCardinality { child: String },

    /// `is_all_contents_in` received something other than quants or packages.
    #[error("expected quants or packages, got {got} instead")]
    TypeMismatch { got: String },

    /// The operation is missing an input it requires.
    #[error("{0}")]
    Precondition(String),

    /// A referenced record does not exist.
    #[error("{kind} not found: '{id}'")]
    NotFound { kind: &'static str, id: String },

    /// Deletion refused: the package still holds other packages.
    #[error("package '{package}' still contains {children} package(s); detach them first")]
    HasChildren { package: String, children: usize },
}

impl HierarchyError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Loop { .. } => ErrorCode::PackageLoop,
            Self::DepthExceeded { .. } => ErrorCode::DepthExceeded,
            Self::MultiLocation { .. } => ErrorCode::MultiLocation,
            Self::LinkCardinality { .. } => ErrorCode::LinkCardinality,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Precondition(_) => ErrorCode::PreconditionFailed,
            Self::NotFound { .. } => ErrorCode::PackageNotFound,
            Self::HasChildren { .. } => ErrorCode::PackageHasChildren,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Shorthand used throughout the hierarchy modules.
pub type HierarchyResult<T> = Result<T, HierarchyError>;
