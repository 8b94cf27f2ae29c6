//! Tests for thread-safety of resolution and close

use objectgraph::{Component, DiResult, Graph};
use rstest::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug)]
struct Shared {
	id: usize,
}

/// Test that concurrent first resolution constructs a singleton exactly once
#[rstest]
fn test_singleton_constructed_once_under_contention() -> DiResult<()> {
	let constructions = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructions);
	let mut builder = Component::builder("app");
	builder.singleton::<Shared, _>(move |_| {
		let id = counter.fetch_add(1, Ordering::SeqCst);
		// widen the race window
		thread::yield_now();
		Ok(Shared { id })
	})?;
	let graph = Graph::open(&builder.build())?;

	let threads = 8;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let graph = graph.clone();
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				graph.instance::<Shared>()
			})
		})
		.collect();

	let instances: Vec<Arc<Shared>> = handles
		.into_iter()
		.map(|h| h.join().unwrap())
		.collect::<DiResult<_>>()?;

	assert_eq!(constructions.load(Ordering::SeqCst), 1);
	for instance in &instances[1..] {
		assert!(Arc::ptr_eq(&instances[0], instance));
	}
	Ok(())
}

/// Test that concurrent prototype resolutions all construct independently
#[rstest]
fn test_prototype_constructed_per_thread() -> DiResult<()> {
	let constructions = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructions);
	let mut builder = Component::builder("app");
	builder.prototype::<usize, _>(move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)))?;
	let graph = Graph::open(&builder.build())?;

	let threads = 8;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let graph = graph.clone();
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				graph.instance::<usize>()
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap()?;
	}

	assert_eq!(constructions.load(Ordering::SeqCst), threads);
	Ok(())
}

/// Test that children racing a parent-bound singleton populate it exactly once
#[rstest]
fn test_parent_singleton_populated_once_across_children() -> DiResult<()> {
	let constructions = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&constructions);
	let mut builder = Component::builder("app");
	builder.singleton::<Shared, _>(move |_| {
		let id = counter.fetch_add(1, Ordering::SeqCst);
		// widen the race window
		thread::yield_now();
		Ok(Shared { id })
	})?;
	builder.subcomponent("request", |_| Ok(()))?;
	let graph = Graph::open(&builder.build())?;

	let threads = 8;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let child = graph.open_subgraph("request")?;
			let barrier = Arc::clone(&barrier);
			Ok(thread::spawn(move || {
				barrier.wait();
				child.instance::<Shared>()
			}))
		})
		.collect::<DiResult<_>>()?;

	let instances: Vec<Arc<Shared>> = handles
		.into_iter()
		.map(|h| h.join().unwrap())
		.collect::<DiResult<_>>()?;

	// the cache populates once, in the parent that owns the binding
	assert_eq!(constructions.load(Ordering::SeqCst), 1);
	let direct = graph.instance::<Shared>()?;
	for instance in &instances {
		assert!(Arc::ptr_eq(&direct, instance));
	}
	Ok(())
}

/// Test that concurrent close calls run the disposal hook exactly once
#[rstest]
fn test_concurrent_close_disposes_once() -> DiResult<()> {
	let disposals = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&disposals);
	let mut builder = Component::builder("app");
	builder.singleton_with_close::<Shared, _, _>(
		|_| Ok(Shared { id: 0 }),
		move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		},
	)?;
	let graph = Graph::open(&builder.build())?;
	graph.instance::<Shared>()?;

	let threads = 4;
	let barrier = Arc::new(Barrier::new(threads));
	let handles: Vec<_> = (0..threads)
		.map(|_| {
			let graph = graph.clone();
			let barrier = Arc::clone(&barrier);
			thread::spawn(move || {
				barrier.wait();
				graph.close();
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}

	assert_eq!(disposals.load(Ordering::SeqCst), 1);
	Ok(())
}

/// Test that resolution on a child concurrent with parent resolution does not deadlock
#[rstest]
fn test_parent_and_child_resolution_in_parallel() -> DiResult<()> {
	let mut builder = Component::builder("app");
	builder.singleton::<String, _>(|_| Ok("parent".to_string()))?;
	builder.subcomponent("session", |session| {
		session.singleton::<Shared, _>(|graph| {
			// resolves through the parent while holding the child lock
			let _ = graph.instance::<String>()?;
			Ok(Shared { id: 1 })
		})?;
		Ok(())
	})?;
	let graph = Graph::open(&builder.build())?;
	let session = graph.open_subgraph("session")?;

	let barrier = Arc::new(Barrier::new(2));
	let parent_side = {
		let graph = graph.clone();
		let barrier = Arc::clone(&barrier);
		thread::spawn(move || {
			barrier.wait();
			graph.instance::<String>()
		})
	};
	let child_side = {
		let session = session.clone();
		let barrier = Arc::clone(&barrier);
		thread::spawn(move || {
			barrier.wait();
			session.instance::<Shared>()
		})
	};

	parent_side.join().unwrap()?;
	child_side.join().unwrap()?;
	Ok(())
}
