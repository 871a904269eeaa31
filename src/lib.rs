// Copyright 2026 The dotpub authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]

//! # dotpub
//!
//! A post-build accessibility rewriter for .NET assemblies. `dotpub` takes a
//! compiled assembly and widens every type, field, property accessor and
//! method to public, so code that links against the rewritten assembly can
//! reach members the original authors kept internal or private. The usual
//! consumers are test harnesses, modding layers and server reimplementations
//! that need to call into an assembly they cannot recompile.
//!
//! Widening visibility is not free: serialization layers that discover
//! members by accessibility would suddenly see every widened field and
//! property. `dotpub` compensates by attaching marker annotations to widened
//! members so the serialized shape of every type stays exactly what it was
//! before rewriting. Compiler-generated machinery (closure display classes,
//! state machines, backing fields) is detected and left untouched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotpub::{publicize_file, PublicizeOptions};
//! use std::path::Path;
//!
//! fn main() -> dotpub::Result<()> {
//!     let summary = publicize_file(
//!         Path::new("GameAssembly.dll"),
//!         Path::new("GameAssembly.public.dll"),
//!         &PublicizeOptions::default(),
//!     )?;
//!     println!("widened {} types", summary.types_widened);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate splits into a pure core and a thin I/O layer:
//!
//! - [`graph`] - the in-memory edit graph of one module's types and members
//! - [`rewriter`] - the widening pass, a worklist walk over the graph
//! - [`markers`] - the serialization marker conventions and their defaults
//! - [`generated`] - detection of compiler-generated elements
//! - [`attributes`] - the ECMA-335 flag constants the pass reads and writes
//! - [`assembly`] - loading, dependency resolution and committing changes
//!
//! The core never touches a file, which keeps every widening rule testable
//! against synthetic graphs. The rewrite is idempotent: running the tool
//! over its own output changes nothing.

pub mod assembly;
pub mod attributes;
pub mod generated;
pub mod graph;
pub mod markers;
pub mod rewriter;

mod error;

/// The generic Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use assembly::{publicize_file, AssemblyResolver, PublicizeOptions, RewriteSession};
pub use error::Error;
pub use graph::ModuleGraph;
pub use markers::{MarkerKind, MarkerSet, MarkerType};
pub use rewriter::{RewriteSummary, Rewriter};
