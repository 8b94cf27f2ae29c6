//! # objectgraph
//!
//! A typed dependency-injection runtime: components declare bindings,
//! graphs instantiate them.
//!
//! A [`Component`] is an immutable template assembled through its builder:
//! constants, prototypes, singletons, eager singletons, multitons, nested
//! subcomponent templates, and members injectors, each addressed by a typed
//! [`Key`]. A [`Graph`] opens against a component and owns the per-scope
//! instance cache; child graphs open from subcomponent templates and fall
//! back to their ancestors for keys they do not bind themselves. Closing a
//! graph cascades through its children and runs registered disposal hooks.
//!
//! ## Example
//!
//! ```
//! use objectgraph::{Component, DiResult, Graph};
//! use std::sync::Arc;
//!
//! # fn main() -> DiResult<()> {
//! let mut builder = Component::builder("application");
//! builder.constant::<&'static str>("postgres://localhost")?;
//! builder.singleton::<String, _>(|graph| {
//! 	let url = graph.instance::<&'static str>()?;
//! 	Ok(format!("pool({url})"))
//! })?;
//! let component = builder.build();
//!
//! let graph = Graph::open(&component)?;
//! let a = graph.instance::<String>()?;
//! let b = graph.instance::<String>()?;
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! graph.close();
//! # Ok(())
//! # }
//! ```
//!
//! Resolution is thread-safe: a singleton is constructed at most once per
//! graph even under concurrent first use, and cyclic dependencies are
//! detected and reported with the full resolution chain.

mod binding;
mod component;
mod error;
mod graph;
mod key;
mod members;
mod provider;
pub mod registry;

pub use binding::{AnyInstance, Binding, Lifetime};
pub use component::{Component, ComponentBuilder};
pub use error::{DiError, DiResult};
pub use graph::Graph;
pub use key::Key;
pub use provider::{Lazy, Provider};
