//! Binding model: lifetimes and construction callbacks

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::graph::Graph;
use crate::key::Key;

/// An erased, shareable constructed instance.
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

pub(crate) type ProviderFn = Arc<dyn Fn(&Graph) -> DiResult<AnyInstance> + Send + Sync>;
pub(crate) type FactoryFn =
	Arc<dyn Fn(&Graph, &(dyn Any + Send + Sync)) -> DiResult<AnyInstance> + Send + Sync>;
pub(crate) type CloseFn = Arc<dyn Fn(&AnyInstance) + Send + Sync>;

/// Caching policy of a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
	/// A new instance per resolution.
	Prototype,
	/// One cached instance per owning graph, created on first use.
	Singleton,
	/// Like [`Lifetime::Singleton`], but constructed when the graph opens.
	EagerSingleton,
}

#[derive(Clone)]
pub(crate) enum Constructor {
	/// Zero-argument construction callback.
	Provider(ProviderFn),
	/// Multiton construction callback taking a runtime argument.
	Factory(FactoryFn),
	/// A pre-built value, returned as-is.
	Constant(AnyInstance),
}

/// A registered recipe for producing a value for a [`Key`].
///
/// Bindings are immutable once created and owned by the component they are
/// registered into. The typed constructors below are what the convenience
/// methods on `ComponentBuilder` use; generated or manual registration code
/// can call them directly and hand the result to `ComponentBuilder::register`.
#[derive(Clone)]
pub struct Binding {
	pub(crate) key: Key,
	pub(crate) lifetime: Lifetime,
	pub(crate) constructor: Constructor,
	pub(crate) on_close: Option<CloseFn>,
}

impl Binding {
	/// A prototype binding: `construct` runs on every resolution.
	pub fn prototype<T, F>(key: Key, construct: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		Self::with_lifetime(key, Lifetime::Prototype, construct)
	}

	/// A singleton binding: `construct` runs at most once per owning graph.
	pub fn singleton<T, F>(key: Key, construct: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		Self::with_lifetime(key, Lifetime::Singleton, construct)
	}

	/// A singleton binding constructed when its owning graph opens.
	pub fn eager_singleton<T, F>(key: Key, construct: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		Self::with_lifetime(key, Lifetime::EagerSingleton, construct)
	}

	/// A singleton binding with a disposal hook, invoked with the cached
	/// instance when the owning graph closes.
	pub fn singleton_with_close<T, F, C>(key: Key, construct: F, on_close: C) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
		C: Fn(&T) + Send + Sync + 'static,
	{
		let mut binding = Self::with_lifetime(key, Lifetime::Singleton, construct);
		binding.on_close = Some(Arc::new(move |instance: &AnyInstance| {
			if let Some(instance) = instance.downcast_ref::<T>() {
				on_close(instance);
			}
		}));
		binding
	}

	/// A constant binding: the value is stored up front and never
	/// constructed or disposed.
	pub fn constant<T>(key: Key, value: T) -> Self
	where
		T: Send + Sync + 'static,
	{
		debug_assert_eq!(key.type_id(), TypeId::of::<T>(), "key/type mismatch for {key}");
		Self {
			key,
			lifetime: Lifetime::Prototype,
			constructor: Constructor::Constant(Arc::new(value)),
			on_close: None,
		}
	}

	/// A multiton binding: `construct` runs on every invocation with the
	/// caller-supplied argument. The key must carry the argument type.
	pub fn multiton<A, T, F>(key: Key, construct: F) -> Self
	where
		A: Send + Sync + 'static,
		T: Send + Sync + 'static,
		F: Fn(&Graph, &A) -> DiResult<T> + Send + Sync + 'static,
	{
		debug_assert_eq!(key.type_id(), TypeId::of::<T>(), "key/type mismatch for {key}");
		debug_assert_eq!(
			key.argument_type_id(),
			Some(TypeId::of::<A>()),
			"key/argument mismatch for {key}"
		);
		let context = key.to_string();
		Self {
			key,
			lifetime: Lifetime::Prototype,
			constructor: Constructor::Factory(Arc::new(
				move |graph: &Graph, argument: &(dyn Any + Send + Sync)| {
					let argument =
						argument
							.downcast_ref::<A>()
							.ok_or_else(|| DiError::TypeMismatch {
								context: context.clone(),
								expected: std::any::type_name::<A>(),
							})?;
					construct(graph, argument).map(|value| Arc::new(value) as AnyInstance)
				},
			)),
			on_close: None,
		}
	}

	pub fn key(&self) -> &Key {
		&self.key
	}

	pub fn lifetime(&self) -> Lifetime {
		self.lifetime
	}

	/// True when the constructor takes a runtime argument.
	pub fn accepts_argument(&self) -> bool {
		matches!(self.constructor, Constructor::Factory(_))
	}

	fn with_lifetime<T, F>(key: Key, lifetime: Lifetime, construct: F) -> Self
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		debug_assert_eq!(key.type_id(), TypeId::of::<T>(), "key/type mismatch for {key}");
		Self {
			key,
			lifetime,
			constructor: Constructor::Provider(Arc::new(move |graph: &Graph| {
				construct(graph).map(|value| Arc::new(value) as AnyInstance)
			})),
			on_close: None,
		}
	}
}
