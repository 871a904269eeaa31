//! Glue between the widening pass and on-disk assembly files.
//!
//! The submodules split the lifecycle: [`resolver`] locates dependency
//! assemblies on disk, [`loader`] projects a loaded module into the edit
//! graph, and [`session`] owns the open-rewrite-commit flow. Most callers
//! only need [`publicize_file`].

pub mod loader;
pub mod resolver;
pub mod session;

pub use resolver::{AssemblyIdentity, AssemblyResolver};
pub use session::RewriteSession;

use std::path::Path;

use tracing::{debug, info};

use crate::markers::MarkerSet;
use crate::rewriter::RewriteSummary;
use crate::Result;

/// Configuration for one [`publicize_file`] run.
#[derive(Debug, Clone, Default)]
pub struct PublicizeOptions {
    /// Marker conventions to honor and attach
    pub markers: MarkerSet,
    /// Extra directories to probe for marker dependency assemblies, on top
    /// of the input file's own directory
    pub search_directories: Vec<std::path::PathBuf>,
}

/// Widens every type in the assembly at `input` and writes the rewritten
/// assembly to `output`.
///
/// The input file is never modified; rewriting an assembly onto itself is
/// not supported.
pub fn publicize_file(
    input: &Path,
    output: &Path,
    options: &PublicizeOptions,
) -> Result<RewriteSummary> {
    let mut resolver = AssemblyResolver::new();
    if let Some(parent) = input.parent() {
        resolver.add_search_directory(parent);
    }
    for directory in &options.search_directories {
        resolver.add_search_directory(directory);
    }

    let mut session = RewriteSession::open(input, options.markers.clone(), resolver)?;
    let summary = session.rewrite_all();
    debug!(
        types = summary.types_widened,
        fields = summary.fields_widened,
        accessors = summary.accessors_widened,
        methods = summary.methods_widened,
        markers = summary.markers_scheduled,
        skipped = summary.generated_skipped,
        "widening pass complete"
    );
    session.commit(output)?;
    info!(input = %input.display(), output = %output.display(), "assembly publicized");
    Ok(summary)
}
