//! Live object graphs and the resolution engine
//!
//! A [`Graph`] is a runtime instantiation of a [`Component`]: it owns the
//! per-scope instance cache, resolves keys against its component and then its
//! ancestry, spawns child graphs from declared subcomponent templates, and
//! cascades `close` through still-open children.
//!
//! Concurrency model: all cache-mutating resolution on one graph is
//! serialized under a single reentrant per-graph lock. Concurrent first-time
//! resolution of a singleton key therefore constructs exactly once; losing
//! threads block until the winner has populated the cache. The reentrancy of
//! the lock is what lets construction callbacks recurse into resolution on
//! the same graph from the same thread, and it confines the in-progress
//! cycle-detection marks to a single logical call chain.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;

use crate::binding::{AnyInstance, Constructor, FactoryFn, Lifetime, ProviderFn};
use crate::component::Component;
use crate::error::{DiError, DiResult};
use crate::key::Key;
use crate::provider::{Lazy, Provider};

/// A live, resolvable instantiation of a [`Component`], optionally parented
/// to another graph.
///
/// `Graph` is a cheap clone-able handle; all clones share the same cache and
/// lifecycle state. Handles may be used from multiple threads concurrently.
#[derive(Clone)]
pub struct Graph {
	inner: Arc<GraphInner>,
}

struct GraphInner {
	component: Arc<Component>,
	/// Non-owning: a graph never keeps its parent alive.
	parent: Weak<GraphInner>,
	has_parent: bool,
	state: ReentrantMutex<RefCell<GraphState>>,
}

struct GraphState {
	open: bool,
	cache: HashMap<Key, AnyInstance>,
	/// Keys currently being constructed, innermost last. Guarded by the
	/// graph lock, so only the call chain holding the lock can observe it.
	resolving: Vec<Key>,
	/// Owning: children are closed before this graph when `close` cascades.
	children: Vec<Graph>,
}

enum Invoke<'a> {
	Provider(&'a ProviderFn),
	Factory(&'a FactoryFn, &'a (dyn Any + Send + Sync)),
}

impl Graph {
	/// Opens a root graph against a component.
	///
	/// Every eager-singleton binding of the component is resolved before
	/// this returns, in declaration order, so configuration errors (missing
	/// dependencies, cycles) surface here rather than on first use.
	pub fn open(component: &Arc<Component>) -> DiResult<Graph> {
		let graph = Graph::new(Arc::clone(component), None);
		tracing::debug!(component = component.name(), "opening graph");
		graph.construct_eager()?;
		Ok(graph)
	}

	fn new(component: Arc<Component>, parent: Option<&Graph>) -> Graph {
		Graph {
			inner: Arc::new(GraphInner {
				has_parent: parent.is_some(),
				parent: parent
					.map(|p| Arc::downgrade(&p.inner))
					.unwrap_or_default(),
				component,
				state: ReentrantMutex::new(RefCell::new(GraphState {
					open: true,
					cache: HashMap::new(),
					resolving: Vec::new(),
					children: Vec::new(),
				})),
			}),
		}
	}

	fn construct_eager(&self) -> DiResult<()> {
		let keys = self.inner.component.eager_keys();
		for key in keys {
			self.resolve(key, None)?;
		}
		if !keys.is_empty() {
			tracing::debug!(
				component = self.inner.component.name(),
				count = keys.len(),
				"eager singletons constructed"
			);
		}
		Ok(())
	}

	/// The component backing this graph.
	pub fn component(&self) -> &Arc<Component> {
		&self.inner.component
	}

	/// The parent graph, if any and still alive.
	pub fn parent(&self) -> Option<Graph> {
		self.inner.parent.upgrade().map(|inner| Graph { inner })
	}

	pub fn is_closed(&self) -> bool {
		!self.inner.state.lock().borrow().open
	}

	/// Retrieves an instance of `T`, constructing it (and its dependencies)
	/// as dictated by the binding kind.
	pub fn instance<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
		self.resolve_typed(&Key::of::<T>())
	}

	pub fn instance_qualified<T: Send + Sync + 'static>(
		&self,
		qualifier: impl Into<Cow<'static, str>>,
	) -> DiResult<Arc<T>> {
		self.resolve_typed(&Key::qualified::<T>(qualifier))
	}

	/// Like [`instance`](Self::instance), but converts a missing binding
	/// into `None`.
	///
	/// Only a top-level [`DiError::NotFound`] is swallowed; a constructor
	/// failure, including a dependency that is itself unbound, still
	/// propagates as an error.
	pub fn instance_or_none<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
		self.optional(&Key::of::<T>())
	}

	pub fn instance_or_none_qualified<T: Send + Sync + 'static>(
		&self,
		qualifier: impl Into<Cow<'static, str>>,
	) -> DiResult<Option<Arc<T>>> {
		self.optional(&Key::qualified::<T>(qualifier))
	}

	/// Erased resolution for callers that carry a [`Key`] instead of a type
	/// parameter.
	pub fn instance_by_key(&self, key: &Key) -> DiResult<AnyInstance> {
		self.resolve(key, None)
	}

	/// Whether a binding for `key` is visible anywhere in the ancestry.
	pub fn contains(&self, key: &Key) -> bool {
		let mut graph = Some(self.clone());
		while let Some(g) = graph {
			if g.inner.component.contains(key) {
				return true;
			}
			graph = g.parent();
		}
		false
	}

	/// Returns a deferred accessor that re-invokes resolution on every call,
	/// respecting the binding's cache policy: a prototype provider yields a
	/// fresh instance per call, a singleton provider the cached one.
	///
	/// Fails up front if no binding for `T` is visible.
	pub fn provider<T: Send + Sync + 'static>(&self) -> DiResult<Provider<T>> {
		self.provider_for(Key::of::<T>())
	}

	pub fn provider_qualified<T: Send + Sync + 'static>(
		&self,
		qualifier: impl Into<Cow<'static, str>>,
	) -> DiResult<Provider<T>> {
		self.provider_for(Key::qualified::<T>(qualifier))
	}

	/// Returns a memoize-on-first-call accessor. The memoization is
	/// single-flight and independent of the graph cache, so a lazy handle to
	/// a prototype binding pins the first constructed instance.
	pub fn lazy<T: Send + Sync + 'static>(&self) -> DiResult<Lazy<T>> {
		Ok(Lazy::new(self.provider()?))
	}

	pub fn lazy_qualified<T: Send + Sync + 'static>(
		&self,
		qualifier: impl Into<Cow<'static, str>>,
	) -> DiResult<Lazy<T>> {
		Ok(Lazy::new(self.provider_qualified(qualifier)?))
	}

	/// Invokes a multiton binding with the supplied argument.
	///
	/// Fails with [`DiError::NotFound`] if no multiton binding producing `T`
	/// from `A` is visible, and with [`DiError::InvalidArgumentBinding`] if
	/// the key is bound to a kind that does not accept arguments.
	pub fn factory<A, T>(&self, argument: &A) -> DiResult<Arc<T>>
	where
		A: Send + Sync + 'static,
		T: Send + Sync + 'static,
	{
		let key = Key::with_argument::<A, T>();
		downcast(self.resolve(&key, Some(argument))?, &key)
	}

	pub fn factory_qualified<A, T>(
		&self,
		qualifier: impl Into<Cow<'static, str>>,
		argument: &A,
	) -> DiResult<Arc<T>>
	where
		A: Send + Sync + 'static,
		T: Send + Sync + 'static,
	{
		let key = Key::qualified_with_argument::<A, T>(qualifier);
		downcast(self.resolve(&key, Some(argument))?, &key)
	}

	/// Resolves every binding in the visible ancestry whose key matches the
	/// base type `T` (any qualifier, no argument type), deduplicated by key,
	/// nearest scope first.
	pub fn instances_of_type<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Arc<T>>> {
		let keys = self.keys_of_type(&Key::of::<T>())?;
		let mut instances = Vec::with_capacity(keys.len());
		for key in &keys {
			instances.push(downcast(self.resolve(key, None)?, key)?);
		}
		Ok(instances)
	}

	/// Like [`instances_of_type`](Self::instances_of_type), but returns
	/// deferred accessors instead of resolving immediately.
	pub fn providers_of_type<T: Send + Sync + 'static>(&self) -> DiResult<Vec<Provider<T>>> {
		let keys = self.keys_of_type(&Key::of::<T>())?;
		Ok(keys
			.into_iter()
			.map(|key| Provider::new(self.clone(), key))
			.collect())
	}

	/// Runs every members injector registered for `T` in the visible
	/// ancestry, resolving dependent keys against *this* graph.
	pub fn inject_members<T: Any>(&self, target: &mut T) -> DiResult<()> {
		self.ensure_open()?;

		let type_id = TypeId::of::<T>();
		let mut found = false;
		let mut graph = Some(self.clone());
		while let Some(g) = graph {
			if let Some(injector) = g.inner.component.injector(type_id) {
				found = true;
				injector(self, target)?;
			}
			graph = g.parent();
		}

		if !found {
			return Err(DiError::MissingMembersInjector {
				type_name: std::any::type_name::<T>(),
			});
		}
		Ok(())
	}

	/// Opens a child graph from the named subcomponent template, with this
	/// graph as its parent. The child's eager singletons are constructed
	/// before it is returned or registered.
	pub fn open_subgraph(&self, qualifier: &str) -> DiResult<Graph> {
		let guard = self.inner.state.lock();
		if !guard.borrow().open {
			return Err(self.closed_error());
		}
		let component = self
			.inner
			.component
			.subcomponent(qualifier)
			.ok_or_else(|| DiError::UnknownSubcomponent {
				qualifier: qualifier.to_string(),
				component: self.inner.component.name().to_string(),
			})?
			.clone();

		tracing::debug!(
			component = self.inner.component.name(),
			subcomponent = qualifier,
			"opening subgraph"
		);
		let child = Graph::new(component, Some(self));
		child.construct_eager()?;
		guard.borrow_mut().children.push(child.clone());
		Ok(child)
	}

	/// Closes this graph: children first, recursively, then the own cache is
	/// drained, invoking the disposal hook of any cached instance whose
	/// binding declares one. Idempotent; every later operation fails with
	/// [`DiError::AlreadyClosed`].
	pub fn close(&self) {
		let children = {
			let guard = self.inner.state.lock();
			let mut state = guard.borrow_mut();
			if !state.open {
				return;
			}
			state.open = false;
			std::mem::take(&mut state.children)
		};
		for child in &children {
			child.close();
		}

		let cache = {
			let guard = self.inner.state.lock();
			let mut state = guard.borrow_mut();
			std::mem::take(&mut state.cache)
		};
		tracing::debug!(
			component = self.inner.component.name(),
			cached = cache.len(),
			"closing graph"
		);
		for (key, instance) in &cache {
			if let Some(on_close) = self
				.inner
				.component
				.binding(key)
				.and_then(|binding| binding.on_close.as_ref())
			{
				on_close(instance);
			}
		}

		// detach from the parent so repeated open/close of subgraphs does
		// not accumulate dead handles
		if let Some(parent) = self.parent() {
			let guard = parent.inner.state.lock();
			guard
				.borrow_mut()
				.children
				.retain(|child| !Arc::ptr_eq(&child.inner, &self.inner));
		}
	}

	pub(crate) fn resolve_typed<T: Send + Sync + 'static>(&self, key: &Key) -> DiResult<Arc<T>> {
		downcast(self.resolve(key, None)?, key)
	}

	/// The resolution algorithm.
	///
	/// Order: own cache, own component's bindings, then the entire
	/// resolution is delegated to the parent. Cache population happens in
	/// the ancestor that owns the binding, which is what makes a singleton
	/// shared across the whole subtree below its owner.
	fn resolve(
		&self,
		key: &Key,
		argument: Option<&(dyn Any + Send + Sync)>,
	) -> DiResult<AnyInstance> {
		let guard = self.inner.state.lock();
		{
			let state = guard.borrow();
			if !state.open {
				return Err(self.closed_error());
			}
			if let Some(cached) = state.cache.get(key) {
				return Ok(cached.clone());
			}
		}

		let Some(binding) = self.inner.component.binding(key) else {
			drop(guard);
			return match self.parent() {
				Some(parent) => parent.resolve(key, argument),
				// parent dropped without close: the subtree is defunct
				None if self.inner.has_parent => Err(self.closed_error()),
				None => Err(DiError::NotFound { key: key.clone() }),
			};
		};

		let invoke = match (&binding.constructor, argument) {
			(Constructor::Constant(value), None) => return Ok(value.clone()),
			(Constructor::Provider(construct), None) => Invoke::Provider(construct),
			(Constructor::Factory(construct), Some(argument)) => {
				Invoke::Factory(construct, argument)
			}
			(Constructor::Factory(_), None) => {
				return Err(DiError::InvalidArgumentBinding {
					key: key.clone(),
					reason: "requires a construction argument",
				});
			}
			(_, Some(_)) => {
				return Err(DiError::InvalidArgumentBinding {
					key: key.clone(),
					reason: "does not accept a construction argument",
				});
			}
		};

		{
			let state = guard.borrow();
			if state.resolving.contains(key) {
				return Err(DiError::Cycle {
					key: key.clone(),
					chain: render_chain(&state.resolving, key),
				});
			}
		}

		guard.borrow_mut().resolving.push(key.clone());
		let constructed = match invoke {
			Invoke::Provider(construct) => construct(self),
			Invoke::Factory(construct, argument) => construct(self, argument),
		};
		guard.borrow_mut().resolving.pop();

		let instance = constructed.map_err(|e| e.into_construction(key))?;

		if matches!(
			binding.lifetime,
			Lifetime::Singleton | Lifetime::EagerSingleton
		) {
			let mut state = guard.borrow_mut();
			// a close that raced in during construction wins; don't
			// repopulate a drained cache
			if state.open {
				state.cache.insert(key.clone(), instance.clone());
			}
		}
		Ok(instance)
	}

	fn optional<T: Send + Sync + 'static>(&self, key: &Key) -> DiResult<Option<Arc<T>>> {
		match self.resolve(key, None) {
			Ok(instance) => downcast(instance, key).map(Some),
			Err(DiError::NotFound { .. }) => Ok(None),
			Err(e) => Err(e),
		}
	}

	fn provider_for<T: Send + Sync + 'static>(&self, key: Key) -> DiResult<Provider<T>> {
		self.ensure_open()?;
		if !self.contains(&key) {
			return Err(DiError::NotFound { key });
		}
		Ok(Provider::new(self.clone(), key))
	}

	/// Collects all keys in the ancestry matching the base type of `proto`,
	/// nearest scope first, deduplicated by full key.
	fn keys_of_type(&self, proto: &Key) -> DiResult<Vec<Key>> {
		self.ensure_open()?;

		let mut seen = HashSet::new();
		let mut keys = Vec::new();
		let mut graph = Some(self.clone());
		while let Some(g) = graph {
			for key in g.inner.component.keys() {
				if key.matches_type(proto) && seen.insert(key.clone()) {
					keys.push(key.clone());
				}
			}
			graph = g.parent();
		}
		Ok(keys)
	}

	fn ensure_open(&self) -> DiResult<()> {
		if self.is_closed() {
			return Err(self.closed_error());
		}
		Ok(())
	}

	fn closed_error(&self) -> DiError {
		DiError::AlreadyClosed {
			graph: self.inner.component.name().to_string(),
		}
	}
}

impl fmt::Debug for Graph {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Graph")
			.field("component", &self.inner.component.name())
			.field("closed", &self.is_closed())
			.finish()
	}
}

fn downcast<T: Send + Sync + 'static>(instance: AnyInstance, key: &Key) -> DiResult<Arc<T>> {
	instance
		.downcast::<T>()
		.map_err(|_| DiError::TypeMismatch {
			context: key.to_string(),
			expected: std::any::type_name::<T>(),
		})
}

/// Renders the cycle starting from the first occurrence of `key` on the
/// resolution stack, e.g. `Key<A> -> Key<B> -> Key<A>`.
fn render_chain(resolving: &[Key], key: &Key) -> String {
	let start = resolving.iter().position(|k| k == key).unwrap_or(0);
	let mut parts: Vec<String> = resolving[start..].iter().map(Key::to_string).collect();
	parts.push(key.to_string());
	parts.join(" -> ")
}
