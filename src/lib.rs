//! Build a queryable, in-memory model of a Java class-file corpus
//!
//! Clients declare where class files live (directories, archives, the
//! platform class library), obtain a [`provider::ClassDataProvider`] that
//! parses classes into an immutable semantic graph on demand, and run a
//! hydration pass that enriches the graph with cross-class information:
//! subclass sets, override links, bridge targets, super-constructor calls,
//! lambda closures. Once hydrated, the graph answers structural questions
//! in constant time, and the [`chain`] engine can complete an external
//! rename database against it.
//!
//! ### Example
//!
//! ```no_run
//! use hypo::chain::{ChangeChain, CopyMappingsDown, MappingsSet, MemoryMappings};
//! use hypo::hydrate::HydrationManager;
//! use hypo::provider::{ClassDataProvider, DirectoryRoot, SystemRoot};
//! use std::sync::Arc;
//!
//! # fn decoder() -> Arc<dyn hypo::class_file::ClassFileDecoder> { unimplemented!() }
//! # fn run() -> hypo::Result<()> {
//! // A provider over a directory of classes, with the JDK as context
//! let provider = ClassDataProvider::builder(decoder())
//!     .root(Box::new(DirectoryRoot::new("build/classes")))
//!     .context_root(Box::new(SystemRoot::locate()?))
//!     .build();
//!
//! // Hydrate the graph with the standard providers
//! HydrationManager::standard().hydrate(&provider)?;
//!
//! // Complete a rename database against the hydrated graph
//! let mappings = MemoryMappings::new().with_method("a/A", "a", None, "run");
//! let mut chain = ChangeChain::new();
//! chain.push(Box::new(CopyMappingsDown));
//! let completed = chain.apply(&mappings, &provider)?;
//! # let _ = completed;
//! # Ok(())
//! # }
//! ```

mod access_flags;
pub mod chain;
pub mod class_file;
mod errors;
pub mod hydrate;
mod model;
pub mod provider;
pub mod types;

pub use access_flags::*;
pub use errors::{Error, Result};
pub use model::*;
