//! Type keys identifying bindings

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;

/// Identifies a binding by type, optional qualifier, and optional
/// construction-argument type.
///
/// Two keys are equal iff all three parts match. The type token is a
/// [`TypeId`], which is reified per full parameterization, so
/// `Key::of::<Vec<String>>()` and `Key::of::<Vec<i32>>()` are distinct keys.
///
/// Keys are cheap value types: created at registration sites and at every
/// resolution call site, freely cloned and compared. Equality and hashing are
/// stable for the lifetime of the process.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key {
	type_id: TypeId,
	type_name: &'static str,
	qualifier: Option<Cow<'static, str>>,
	argument: Option<(TypeId, &'static str)>,
}

impl Key {
	/// Key for an unqualified binding of `T`.
	pub fn of<T: 'static>() -> Self {
		Self {
			type_id: TypeId::of::<T>(),
			type_name: std::any::type_name::<T>(),
			qualifier: None,
			argument: None,
		}
	}

	/// Key for a binding of `T` under the given qualifier.
	pub fn qualified<T: 'static>(qualifier: impl Into<Cow<'static, str>>) -> Self {
		Self {
			qualifier: Some(qualifier.into()),
			..Self::of::<T>()
		}
	}

	/// Key for a multiton binding producing `T` from an argument of type `A`.
	pub fn with_argument<A: 'static, T: 'static>() -> Self {
		Self {
			argument: Some((TypeId::of::<A>(), std::any::type_name::<A>())),
			..Self::of::<T>()
		}
	}

	/// Key for a qualified multiton binding producing `T` from an argument
	/// of type `A`.
	pub fn qualified_with_argument<A: 'static, T: 'static>(
		qualifier: impl Into<Cow<'static, str>>,
	) -> Self {
		Self {
			qualifier: Some(qualifier.into()),
			..Self::with_argument::<A, T>()
		}
	}

	/// Name of the produced type, for diagnostics.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn qualifier(&self) -> Option<&str> {
		self.qualifier.as_deref()
	}

	/// True for multiton keys that carry a construction-argument type.
	pub fn has_argument(&self) -> bool {
		self.argument.is_some()
	}

	pub fn argument_type_name(&self) -> Option<&'static str> {
		self.argument.map(|(_, name)| name)
	}

	/// Same type and argument tokens as `other`, ignoring the qualifier.
	///
	/// This is the match rule used by the `*_of_type` graph queries.
	pub fn matches_type(&self, other: &Key) -> bool {
		self.type_id == other.type_id
			&& self.argument.map(|(id, _)| id) == other.argument.map(|(id, _)| id)
	}

	pub(crate) fn type_id(&self) -> TypeId {
		self.type_id
	}

	pub(crate) fn argument_type_id(&self) -> Option<TypeId> {
		self.argument.map(|(id, _)| id)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.argument {
			Some((_, argument)) => write!(f, "Key<{} -> {}>", argument, self.type_name)?,
			None => write!(f, "Key<{}>", self.type_name)?,
		}
		if let Some(qualifier) = &self.qualifier {
			write!(f, "(\"{qualifier}\")")?;
		}
		Ok(())
	}
}

impl fmt::Debug for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generic_parameterizations_are_distinct() {
		assert_ne!(Key::of::<Vec<String>>(), Key::of::<Vec<i32>>());
		assert_eq!(Key::of::<Vec<String>>(), Key::of::<Vec<String>>());
	}

	#[test]
	fn qualifier_is_part_of_identity() {
		assert_ne!(Key::of::<String>(), Key::qualified::<String>("a"));
		assert_ne!(
			Key::qualified::<String>("a"),
			Key::qualified::<String>("b")
		);
		assert_eq!(
			Key::qualified::<String>("a"),
			Key::qualified::<String>("a")
		);
	}

	#[test]
	fn argument_type_is_part_of_identity() {
		assert_ne!(Key::of::<String>(), Key::with_argument::<i32, String>());
		assert_ne!(
			Key::with_argument::<i32, String>(),
			Key::with_argument::<u32, String>()
		);
	}

	#[test]
	fn matches_type_ignores_qualifier() {
		let plain = Key::of::<String>();
		assert!(plain.matches_type(&Key::qualified::<String>("a")));
		assert!(!plain.matches_type(&Key::of::<i32>()));
		assert!(!plain.matches_type(&Key::with_argument::<i32, String>()));
	}

	#[test]
	fn display_includes_qualifier_and_argument() {
		let key = Key::qualified_with_argument::<i32, String>("a");
		let rendered = key.to_string();
		assert!(rendered.contains("i32"));
		assert!(rendered.contains("String"));
		assert!(rendered.contains("\"a\""));
	}
}
