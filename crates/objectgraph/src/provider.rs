//! Deferred and memoized accessors to graph bindings

use std::marker::PhantomData;

use once_cell::sync::OnceCell;

use crate::error::DiResult;
use crate::graph::Graph;
use crate::key::Key;

/// A deferred handle to a binding, bound to the graph it was obtained from.
///
/// Each [`get`](Provider::get) re-enters resolution, so the binding's own
/// caching policy applies: a prototype yields a fresh instance per call, a
/// singleton the graph-cached one. Once the graph is closed every call fails
/// with [`DiError::AlreadyClosed`](crate::DiError::AlreadyClosed).
pub struct Provider<T> {
	graph: Graph,
	key: Key,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Provider<T> {
	pub(crate) fn new(graph: Graph, key: Key) -> Self {
		Self {
			graph,
			key,
			_marker: PhantomData,
		}
	}

	pub fn get(&self) -> DiResult<std::sync::Arc<T>> {
		self.graph.resolve_typed(&self.key)
	}

	pub fn key(&self) -> &Key {
		&self.key
	}
}

impl<T> std::fmt::Debug for Provider<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Provider")
			.field("graph", &self.graph)
			.field("key", &self.key)
			.finish()
	}
}

impl<T> Clone for Provider<T> {
	fn clone(&self) -> Self {
		Self {
			graph: self.graph.clone(),
			key: self.key.clone(),
			_marker: PhantomData,
		}
	}
}

/// A memoize-on-first-call accessor.
///
/// The first successful [`get`](Lazy::get) resolves through the underlying
/// provider and pins the result; later calls return the pinned instance
/// without touching the graph, even for prototype bindings and even after
/// the graph has closed. A failed first call memoizes nothing.
pub struct Lazy<T> {
	provider: Provider<T>,
	cell: OnceCell<std::sync::Arc<T>>,
}

impl<T: Send + Sync + 'static> Lazy<T> {
	pub(crate) fn new(provider: Provider<T>) -> Self {
		Self {
			provider,
			cell: OnceCell::new(),
		}
	}

	pub fn get(&self) -> DiResult<std::sync::Arc<T>> {
		self.cell
			.get_or_try_init(|| self.provider.get())
			.cloned()
	}

	/// The pinned instance, if the first resolution already happened.
	pub fn peek(&self) -> Option<std::sync::Arc<T>> {
		self.cell.get().cloned()
	}
}
