//! Members-injector protocol
//!
//! A members injector is a callback registered for a concrete target type
//! that fills in the target's dependent fields by issuing further key
//! resolutions against a graph. Injectors are registered on components
//! (usually by generated registration code) and run via
//! [`Graph::inject_members`](crate::Graph::inject_members).

use std::any::Any;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::graph::Graph;

/// Erased injector callback stored on a component, keyed by the target's
/// `TypeId`.
pub(crate) type InjectorFn = Arc<dyn Fn(&Graph, &mut dyn Any) -> DiResult<()> + Send + Sync>;

/// Erases a typed injector callback.
///
/// The lookup is keyed by the target's `TypeId`, so the downcast only fails
/// if the injector table was corrupted; that is reported as a type mismatch
/// rather than silently ignored.
pub(crate) fn erase<T, F>(inject: F) -> InjectorFn
where
	T: Any,
	F: Fn(&Graph, &mut T) -> DiResult<()> + Send + Sync + 'static,
{
	Arc::new(move |graph: &Graph, target: &mut dyn Any| {
		let target = target
			.downcast_mut::<T>()
			.ok_or_else(|| DiError::TypeMismatch {
				context: format!("members injector for `{}`", std::any::type_name::<T>()),
				expected: std::any::type_name::<T>(),
			})?;
		inject(graph, target)
	})
}
