//! Immutable component templates and their builder

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::binding::{Binding, Lifetime};
use crate::error::{DiError, DiResult};
use crate::graph::Graph;
use crate::key::Key;
use crate::members::{self, InjectorFn};

/// An immutable, named template describing the bindings, subcomponent
/// templates, and members injectors of one scope.
///
/// A component is built once via [`Component::builder`] and can then back
/// arbitrarily many independent [`Graph`]s, each with its own instance cache.
pub struct Component {
	name: String,
	is_subcomponent: bool,
	bindings: HashMap<Key, Binding>,
	eager: Vec<Key>,
	subcomponents: HashMap<String, Arc<Component>>,
	injectors: HashMap<TypeId, (&'static str, InjectorFn)>,
}

impl Component {
	pub fn builder(name: impl Into<String>) -> ComponentBuilder {
		ComponentBuilder::new(name.into(), false)
	}

	/// The component's name: the scope qualifier for subcomponents, a free
	/// diagnostic label for root components.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_subcomponent(&self) -> bool {
		self.is_subcomponent
	}

	/// Whether this component carries the given scope qualifier.
	///
	/// Registration code generated from scope-annotated sources calls this
	/// to assert it is installing into a matching component.
	pub fn has_qualifier(&self, qualifier: &str) -> bool {
		self.name == qualifier
	}

	/// Whether a binding is registered for `key` in this component (parents
	/// are not consulted; see [`Graph::contains`] for the ancestry-wide
	/// check).
	pub fn contains(&self, key: &Key) -> bool {
		self.bindings.contains_key(key)
	}

	pub fn subcomponent_qualifiers(&self) -> impl Iterator<Item = &str> {
		self.subcomponents.keys().map(String::as_str)
	}

	pub(crate) fn binding(&self, key: &Key) -> Option<&Binding> {
		self.bindings.get(key)
	}

	pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
		self.bindings.keys()
	}

	pub(crate) fn eager_keys(&self) -> &[Key] {
		&self.eager
	}

	pub(crate) fn subcomponent(&self, qualifier: &str) -> Option<&Arc<Component>> {
		self.subcomponents.get(qualifier)
	}

	pub(crate) fn injector(&self, target: TypeId) -> Option<&InjectorFn> {
		self.injectors.get(&target).map(|(_, injector)| injector)
	}
}

/// Builder producing an immutable [`Component`].
///
/// All declaration methods fail fast: duplicate keys, duplicate subcomponent
/// qualifiers, and duplicate injectors are rejected at declaration time, not
/// at resolution time. Builders share no mutable state, so independently
/// configured builders can be built concurrently.
pub struct ComponentBuilder {
	name: String,
	is_subcomponent: bool,
	bindings: HashMap<Key, Binding>,
	eager: Vec<Key>,
	subcomponents: HashMap<String, Arc<Component>>,
	injectors: HashMap<TypeId, (&'static str, InjectorFn)>,
}

impl std::fmt::Debug for ComponentBuilder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ComponentBuilder")
			.field("name", &self.name)
			.field("is_subcomponent", &self.is_subcomponent)
			.finish_non_exhaustive()
	}
}

impl ComponentBuilder {
	fn new(name: String, is_subcomponent: bool) -> Self {
		Self {
			name,
			is_subcomponent,
			bindings: HashMap::new(),
			eager: Vec::new(),
			subcomponents: HashMap::new(),
			injectors: HashMap::new(),
		}
	}

	/// Registers a binding under its key.
	///
	/// This is the registration protocol consumed by generated or manual
	/// configuration code; the convenience methods below all funnel into it.
	/// Fails with [`DiError::DuplicateBinding`] if the key is already bound
	/// and `override_existing` is false.
	pub fn register(&mut self, binding: Binding, override_existing: bool) -> DiResult<&mut Self> {
		let key = binding.key().clone();
		if self.bindings.contains_key(&key) && !override_existing {
			return Err(DiError::DuplicateBinding { key });
		}
		if binding.lifetime() == Lifetime::EagerSingleton {
			if !self.eager.contains(&key) {
				self.eager.push(key.clone());
			}
		} else {
			// an override may replace an eager binding with a lazy one
			self.eager.retain(|k| k != &key);
		}
		self.bindings.insert(key, binding);
		Ok(self)
	}

	/// Declares a prototype binding for `T`: a fresh instance per resolution.
	pub fn prototype<T, F>(&mut self, construct: F) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(Binding::prototype(Key::of::<T>(), construct), false)
	}

	pub fn prototype_qualified<T, F>(
		&mut self,
		qualifier: impl Into<Cow<'static, str>>,
		construct: F,
	) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(
			Binding::prototype(Key::qualified::<T>(qualifier), construct),
			false,
		)
	}

	/// Declares a singleton binding for `T`: constructed at most once per
	/// owning graph, on first use.
	pub fn singleton<T, F>(&mut self, construct: F) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(Binding::singleton(Key::of::<T>(), construct), false)
	}

	pub fn singleton_qualified<T, F>(
		&mut self,
		qualifier: impl Into<Cow<'static, str>>,
		construct: F,
	) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(
			Binding::singleton(Key::qualified::<T>(qualifier), construct),
			false,
		)
	}

	/// Declares a singleton with a disposal hook invoked on graph close.
	pub fn singleton_with_close<T, F, C>(&mut self, construct: F, on_close: C) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
		C: Fn(&T) + Send + Sync + 'static,
	{
		self.register(
			Binding::singleton_with_close(Key::of::<T>(), construct, on_close),
			false,
		)
	}

	/// Declares an eager singleton: constructed when a graph opens, in
	/// declaration order, before `open` returns.
	pub fn eager_singleton<T, F>(&mut self, construct: F) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(Binding::eager_singleton(Key::of::<T>(), construct), false)
	}

	pub fn eager_singleton_qualified<T, F>(
		&mut self,
		qualifier: impl Into<Cow<'static, str>>,
		construct: F,
	) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
		F: Fn(&Graph) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(
			Binding::eager_singleton(Key::qualified::<T>(qualifier), construct),
			false,
		)
	}

	/// Declares a constant value for `T`.
	pub fn constant<T>(&mut self, value: T) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
	{
		self.register(Binding::constant(Key::of::<T>(), value), false)
	}

	pub fn constant_qualified<T>(
		&mut self,
		qualifier: impl Into<Cow<'static, str>>,
		value: T,
	) -> DiResult<&mut Self>
	where
		T: Send + Sync + 'static,
	{
		self.register(Binding::constant(Key::qualified::<T>(qualifier), value), false)
	}

	/// Declares a multiton binding producing `T` from a runtime argument of
	/// type `A`, invoked via [`Graph::factory`].
	pub fn multiton<A, T, F>(&mut self, construct: F) -> DiResult<&mut Self>
	where
		A: Send + Sync + 'static,
		T: Send + Sync + 'static,
		F: Fn(&Graph, &A) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(
			Binding::multiton(Key::with_argument::<A, T>(), construct),
			false,
		)
	}

	pub fn multiton_qualified<A, T, F>(
		&mut self,
		qualifier: impl Into<Cow<'static, str>>,
		construct: F,
	) -> DiResult<&mut Self>
	where
		A: Send + Sync + 'static,
		T: Send + Sync + 'static,
		F: Fn(&Graph, &A) -> DiResult<T> + Send + Sync + 'static,
	{
		self.register(
			Binding::multiton(Key::qualified_with_argument::<A, T>(qualifier), construct),
			false,
		)
	}

	/// Registers the members injector for concrete type `T`.
	pub fn members_injector<T, F>(&mut self, inject: F) -> DiResult<&mut Self>
	where
		T: Any,
		F: Fn(&Graph, &mut T) -> DiResult<()> + Send + Sync + 'static,
	{
		let target = TypeId::of::<T>();
		let type_name = std::any::type_name::<T>();
		if self.injectors.contains_key(&target) {
			return Err(DiError::DuplicateInjector { type_name });
		}
		self.injectors
			.insert(target, (type_name, members::erase(inject)));
		Ok(self)
	}

	/// Declares a nested subcomponent template, built with its own builder.
	///
	/// Fails with [`DiError::DuplicateSubcomponent`] if the qualifier is
	/// already used within this component.
	pub fn subcomponent(
		&mut self,
		qualifier: &str,
		block: impl FnOnce(&mut ComponentBuilder) -> DiResult<()>,
	) -> DiResult<&mut Self> {
		if self.subcomponents.contains_key(qualifier) {
			return Err(DiError::DuplicateSubcomponent {
				qualifier: qualifier.to_string(),
				component: self.name.clone(),
			});
		}
		let mut builder = ComponentBuilder::new(qualifier.to_string(), true);
		block(&mut builder)?;
		self.subcomponents
			.insert(qualifier.to_string(), builder.build());
		Ok(self)
	}

	/// Merges another component's bindings, eager keys, subcomponent
	/// templates, and injectors into this builder.
	///
	/// Per-key conflicts follow the same rule as [`register`](Self::register):
	/// with `allow_override` the incoming entry replaces the existing one,
	/// without it the merge fails.
	pub fn include(&mut self, other: &Component, allow_override: bool) -> DiResult<&mut Self> {
		for (key, binding) in &other.bindings {
			if self.bindings.contains_key(key) && !allow_override {
				return Err(DiError::DuplicateBinding { key: key.clone() });
			}
			if binding.lifetime() != Lifetime::EagerSingleton {
				// an override may replace an eager binding with a lazy one
				self.eager.retain(|k| k != key);
			}
			self.bindings.insert(key.clone(), binding.clone());
		}
		// incoming eager keys keep their declaration order
		for key in &other.eager {
			if !self.eager.contains(key) {
				self.eager.push(key.clone());
			}
		}
		for (qualifier, subcomponent) in &other.subcomponents {
			if self.subcomponents.contains_key(qualifier) && !allow_override {
				return Err(DiError::DuplicateSubcomponent {
					qualifier: qualifier.clone(),
					component: self.name.clone(),
				});
			}
			self.subcomponents
				.insert(qualifier.clone(), subcomponent.clone());
		}
		for (target, (type_name, injector)) in &other.injectors {
			if self.injectors.contains_key(target) && !allow_override {
				return Err(DiError::DuplicateInjector {
					type_name: *type_name,
				});
			}
			self.injectors
				.insert(*target, (*type_name, injector.clone()));
		}
		Ok(self)
	}

	/// Freezes the structure and returns the immutable component.
	pub fn build(self) -> Arc<Component> {
		Arc::new(Component {
			name: self.name,
			is_subcomponent: self.is_subcomponent,
			bindings: self.bindings,
			eager: self.eager,
			subcomponents: self.subcomponents,
			injectors: self.injectors,
		})
	}
}
