use thiserror::Error;

/// The generic Error type covering all failures this library can produce.
///
/// Rewriting is a one-shot, deterministic structural transform: there are no
/// retries and no partial-success modes. Any failure aborts the current
/// rewrite session and surfaces to the caller unchanged; nothing is logged or
/// suppressed by the core.
#[derive(Error, Debug)]
pub enum Error {
    /// A marker annotation constructor could not be resolved or imported
    /// into the target module.
    ///
    /// Without the marker constructors no compensating annotations can be
    /// attached, so no meaningful rewrite is possible. This aborts the
    /// whole session.
    #[error("failed to resolve marker annotation '{name}': {reason}")]
    MarkerResolution {
        /// Namespace-qualified name of the marker type that failed to resolve
        name: String,
        /// Why resolution failed
        reason: String,
    },

    /// A dependent assembly was not found in any configured search directory.
    #[error("assembly '{0}' was not found in any search directory")]
    AssemblyNotFound(String),

    /// The module uses a metadata shape this rewriter does not handle.
    #[error("unsupported metadata shape: {0}")]
    NotSupported(String),

    /// File I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Error from the underlying assembly format library.
    #[error(transparent)]
    Format(#[from] dotscope::Error),
}
