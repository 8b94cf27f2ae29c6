//! Process-wide named graph registry
//!
//! An optional convenience for applications that want well-known graphs
//! (an application-scope root, a per-request scope in tests) reachable from
//! code that cannot thread a [`Graph`] handle through. Registration is
//! explicit; nothing in the engine registers graphs on its own.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::graph::Graph;

static GRAPHS: Lazy<RwLock<HashMap<String, Graph>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `graph` under `name`, returning the previously registered graph
/// if the name was taken.
pub fn register(name: impl Into<String>, graph: Graph) -> Option<Graph> {
	let name = name.into();
	tracing::debug!(name = %name, "registering graph");
	GRAPHS.write().insert(name, graph)
}

/// Looks up a registered graph by name.
pub fn get(name: &str) -> Option<Graph> {
	GRAPHS.read().get(name).cloned()
}

/// Removes and returns the graph registered under `name`.
///
/// The graph is not closed; dropping the returned handle without closing it
/// leaks no resources beyond the cached instances themselves.
pub fn unregister(name: &str) -> Option<Graph> {
	tracing::debug!(name = %name, "unregistering graph");
	GRAPHS.write().remove(name)
}

/// Removes and closes the graph registered under `name`. Returns whether a
/// graph was registered.
pub fn close_and_unregister(name: &str) -> bool {
	match unregister(name) {
		Some(graph) => {
			graph.close();
			true
		}
		None => false,
	}
}
