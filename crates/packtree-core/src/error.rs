use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    PackageNotFound,
    PackageLoop,
    DepthExceeded,
    MultiLocation,
    LinkCardinality,
    TypeMismatch,
    PreconditionFailed,
    PackageHasChildren,
    CorruptStore,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::PackageNotFound => "E2001",
            Self::PackageLoop => "E2002",
            Self::DepthExceeded => "E2003",
            Self::MultiLocation => "E2004",
            Self::LinkCardinality => "E2005",
            Self::TypeMismatch => "E2006",
            Self::PreconditionFailed => "E2007",
            Self::PackageHasChildren => "E2008",
            Self::CorruptStore => "E3001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::PackageNotFound => "Package not found",
            Self::PackageLoop => "Package would become its own ancestor",
            Self::DepthExceeded => "Maximum package depth exceeded",
            Self::MultiLocation => "Package contents span several locations",
            Self::LinkCardinality => "Conflicting hierarchy links for one package",
            Self::TypeMismatch => "Unsupported content type",
            Self::PreconditionFailed => "Operation precondition not met",
            Self::PackageHasChildren => "Package still contains other packages",
            Self::CorruptStore => "Corrupt package database",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `pkt init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .packtree/config.toml and retry."),
            Self::PackageNotFound => None,
            Self::PackageLoop => Some("Choose a parent outside the package's own subtree."),
            Self::DepthExceeded => {
                Some("Flatten the hierarchy or raise max_package_depth for the warehouse.")
            }
            Self::MultiLocation => {
                Some("Move all contents of the package tree to a single location first.")
            }
            Self::LinkCardinality => {
                Some("Propose at most one new parent per package (plus one unlink).")
            }
            Self::TypeMismatch => Some("Pass either quants or packages, not a mix."),
            Self::PreconditionFailed => None,
            Self::PackageHasChildren => Some("Detach the child packages before deleting."),
            Self::CorruptStore => Some("Restore .packtree/packtree.db from a backup."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
