//! Error types for registration and resolution

use crate::key::Key;
use thiserror::Error;

pub type DiResult<T> = Result<T, DiError>;

/// All failures surfaced by the engine.
///
/// Builder-time errors (`DuplicateBinding`, `DuplicateSubcomponent`,
/// `DuplicateInjector`) are detected synchronously while declaring; they are
/// never deferred to resolution time. Resolution-time failures are fail-fast
/// and never retried.
#[derive(Debug, Error)]
pub enum DiError {
	/// No binding found for the key anywhere in the graph ancestry.
	#[error("no binding found for {key}")]
	NotFound { key: Key },

	/// Resolution of a key re-entered itself before completing.
	#[error("cyclic dependency for {key} (resolution chain: {chain})")]
	Cycle { key: Key, chain: String },

	#[error("binding for {key} already exists (register with override to replace it)")]
	DuplicateBinding { key: Key },

	#[error("subcomponent `{qualifier}` is already declared in component `{component}`")]
	DuplicateSubcomponent { qualifier: String, component: String },

	#[error("members injector for `{type_name}` already exists")]
	DuplicateInjector { type_name: &'static str },

	#[error("component `{component}` has no subcomponent `{qualifier}`")]
	UnknownSubcomponent { qualifier: String, component: String },

	#[error("graph `{graph}` is already closed")]
	AlreadyClosed { graph: String },

	#[error("no members injector registered for `{type_name}`")]
	MissingMembersInjector { type_name: &'static str },

	/// A binding was invoked with an argument it does not accept, or without
	/// the argument it requires.
	#[error("{key} {reason}")]
	InvalidArgumentBinding { key: Key, reason: &'static str },

	/// The bound value could not be downcast to the requested type. This
	/// indicates a registration made through the erased protocol with a key
	/// that does not match the constructed type.
	#[error("value bound for {context} is not of the requested type `{expected}`")]
	TypeMismatch {
		context: String,
		expected: &'static str,
	},

	/// A construction callback failed while resolving `key`.
	///
	/// Nested values of this variant encode the dependency chain that led to
	/// the failure: resolving `A` which constructs `B` which fails produces
	/// `Construction(A, Construction(B, cause))`.
	#[error("error while constructing {key}")]
	Construction {
		key: Key,
		#[source]
		source: Box<DiError>,
	},

	/// An arbitrary failure raised by user-supplied construction code.
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl DiError {
	/// True for the "no binding found" kind that `instance_or_none`
	/// converts into an absence sentinel.
	pub fn is_not_found(&self) -> bool {
		matches!(self, DiError::NotFound { .. })
	}

	/// Wraps a constructor failure with the key being resolved.
	///
	/// Cycle and closed-graph errors pass through unwrapped so callers can
	/// match on their kind directly.
	pub(crate) fn into_construction(self, key: &Key) -> DiError {
		match self {
			e @ (DiError::Cycle { .. } | DiError::AlreadyClosed { .. }) => e,
			other => DiError::Construction {
				key: key.clone(),
				source: Box::new(other),
			},
		}
	}
}
