//! Tests for component declaration and builder-time validation

use objectgraph::{Binding, Component, DiError, DiResult, Key};
use rstest::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, PartialEq)]
struct Config {
	url: String,
}

/// Test that duplicate keys are rejected at declaration time
#[rstest]
fn test_duplicate_binding_rejected() {
	let mut builder = Component::builder("app");
	builder.constant::<u32>(1).unwrap();

	let err = builder.constant::<u32>(2).unwrap_err();

	assert!(matches!(err, DiError::DuplicateBinding { key } if key == Key::of::<u32>()));
}

/// Test that an explicit override replaces an existing binding
#[rstest]
fn test_register_with_override_replaces() -> DiResult<()> {
	let mut builder = Component::builder("app");
	builder.constant::<u32>(1)?;
	builder.register(Binding::constant(Key::of::<u32>(), 2u32), true)?;
	let graph = objectgraph::Graph::open(&builder.build())?;

	assert_eq!(*graph.instance::<u32>()?, 2);
	Ok(())
}

/// Test that qualified keys do not collide with the unqualified key
#[rstest]
fn test_qualified_keys_are_distinct() -> DiResult<()> {
	let mut builder = Component::builder("app");
	builder.constant::<u32>(1)?;
	builder.constant_qualified::<u32>("limit", 10)?;
	builder.constant_qualified::<u32>("offset", 20)?;
	let graph = objectgraph::Graph::open(&builder.build())?;

	assert_eq!(*graph.instance::<u32>()?, 1);
	assert_eq!(*graph.instance_qualified::<u32>("limit")?, 10);
	assert_eq!(*graph.instance_qualified::<u32>("offset")?, 20);
	Ok(())
}

/// Test that duplicate subcomponent qualifiers are rejected
#[rstest]
fn test_duplicate_subcomponent_rejected() {
	let mut builder = Component::builder("app");
	builder.subcomponent("session", |_| Ok(())).unwrap();

	let err = builder.subcomponent("session", |_| Ok(())).unwrap_err();

	assert!(matches!(
		err,
		DiError::DuplicateSubcomponent { qualifier, component }
			if qualifier == "session" && component == "app"
	));
}

/// Test that a declaration failure inside a subcomponent block propagates
#[rstest]
fn test_subcomponent_block_error_propagates() {
	let mut builder = Component::builder("app");

	let err = builder
		.subcomponent("session", |session| {
			session.constant::<u32>(1)?;
			session.constant::<u32>(2)?;
			Ok(())
		})
		.unwrap_err();

	assert!(matches!(err, DiError::DuplicateBinding { .. }));
	// the failed subcomponent must not be installed
	assert_eq!(builder.build().subcomponent_qualifiers().count(), 0);
}

/// Test that duplicate members injectors for a type are rejected
#[rstest]
fn test_duplicate_members_injector_rejected() {
	let mut builder = Component::builder("app");
	builder
		.members_injector::<Config, _>(|_, _| Ok(()))
		.unwrap();

	let err = builder
		.members_injector::<Config, _>(|_, _| Ok(()))
		.unwrap_err();

	assert!(matches!(err, DiError::DuplicateInjector { .. }));
}

/// Test merging one component into another
#[rstest]
fn test_include_merges_bindings_and_subcomponents() -> DiResult<()> {
	let mut base = Component::builder("base");
	base.constant::<u32>(7)?;
	base.subcomponent("session", |session| {
		session.constant::<&'static str>("session-scoped")?;
		Ok(())
	})?;
	let base = base.build();

	let mut app = Component::builder("app");
	app.constant::<String>("app".to_string())?;
	app.include(&base, false)?;
	let component = app.build();

	assert!(component.contains(&Key::of::<u32>()));
	assert!(component.contains(&Key::of::<String>()));
	assert_eq!(
		component.subcomponent_qualifiers().collect::<Vec<_>>(),
		vec!["session"]
	);
	Ok(())
}

/// Test that include without override rejects conflicting keys
#[rstest]
fn test_include_conflict_rejected() -> DiResult<()> {
	let mut base = Component::builder("base");
	base.constant::<u32>(7)?;
	let base = base.build();

	let mut app = Component::builder("app");
	app.constant::<u32>(9)?;

	let err = app.include(&base, false).unwrap_err();
	assert!(matches!(err, DiError::DuplicateBinding { .. }));

	// with override the included binding wins
	let mut app = Component::builder("app");
	app.constant::<u32>(9)?;
	app.include(&base, true)?;
	let graph = objectgraph::Graph::open(&app.build())?;
	assert_eq!(*graph.instance::<u32>()?, 7);
	Ok(())
}

/// Test that an include override replacing an eager binding drops the eager key
#[rstest]
fn test_include_override_clears_stale_eager_key() -> DiResult<()> {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let mut base = Component::builder("base");
	base.prototype::<u32, _>(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst) as u32))?;
	let base = base.build();

	let mut app = Component::builder("app");
	app.eager_singleton::<u32, _>(|_| Ok(0))?;
	app.include(&base, true)?;
	let graph = objectgraph::Graph::open(&app.build())?;

	// the surviving prototype must not have run during open
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	graph.instance::<u32>()?;
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	Ok(())
}

/// Test that an included eager binding replacing a lazy one becomes eager
#[rstest]
fn test_include_override_installs_incoming_eager_key() -> DiResult<()> {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&calls);
	let mut base = Component::builder("base");
	base.eager_singleton::<u32, _>(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst) as u32))?;
	let base = base.build();

	let mut app = Component::builder("app");
	app.singleton::<u32, _>(|_| Ok(0))?;
	app.include(&base, true)?;
	let _graph = objectgraph::Graph::open(&app.build())?;

	assert_eq!(calls.load(Ordering::SeqCst), 1);
	Ok(())
}

/// Test component metadata accessors
#[rstest]
fn test_component_metadata() -> DiResult<()> {
	let mut builder = Component::builder("application");
	builder.constant::<u32>(1)?;
	builder.subcomponent("request", |request| {
		request.constant::<u64>(2)?;
		Ok(())
	})?;
	let component = builder.build();

	assert_eq!(component.name(), "application");
	assert!(!component.is_subcomponent());
	assert!(component.has_qualifier("application"));
	assert!(!component.has_qualifier("request"));
	assert!(component.contains(&Key::of::<u32>()));
	assert!(!component.contains(&Key::of::<u64>()));
	Ok(())
}

/// Test that one component can back several independent graphs
#[rstest]
fn test_component_backs_independent_graphs() -> DiResult<()> {
	let mut builder = Component::builder("app");
	builder.singleton::<Config, _>(|_| {
		Ok(Config {
			url: "localhost".to_string(),
		})
	})?;
	let component = builder.build();

	let first = objectgraph::Graph::open(&component)?;
	let second = objectgraph::Graph::open(&component)?;

	let a = first.instance::<Config>()?;
	let b = second.instance::<Config>()?;
	assert!(!Arc::ptr_eq(&a, &b));
	Ok(())
}
