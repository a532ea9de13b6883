use bindery::{multiton, singleton, Container, Context, Inject, InstantiateErrorKind, Module};
use core::sync::atomic::{AtomicU32, Ordering};
use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

const THREADS: usize = 16;

struct Session;

struct Pool(u32);
struct Connection(Arc<Pool>);

fn spawn_all<T: Send + 'static>(task: impl Fn(usize) -> T + Send + Sync + 'static) -> Vec<T> {
    let task = Arc::new(task);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let task = task.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                task(index)
            })
        })
        .collect();

    handles.into_iter().map(|handle| handle.join().unwrap()).collect()
}

#[test]
fn test_singleton_produced_once_across_threads() {
    let produced = Arc::new(AtomicU32::new(0));
    let container = Container::new([Module::new("db").bind(singleton({
        let produced = produced.clone();
        move || {
            thread::sleep(Duration::from_millis(10));
            Ok::<_, InstantiateErrorKind>(Pool(produced.fetch_add(1, Ordering::SeqCst)))
        }
    }))])
    .unwrap();

    let pools = spawn_all({
        let container = container.clone();
        move |_| container.get::<Pool>().unwrap()
    });

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
}

#[test]
fn test_dependent_singletons_across_threads() {
    let produced = Arc::new(AtomicU32::new(0));
    let container = Container::new([Module::new("db")
        .bind(singleton({
            let produced = produced.clone();
            move || Ok::<_, InstantiateErrorKind>(Pool(produced.fetch_add(1, Ordering::SeqCst)))
        }))
        .bind(singleton(|Inject(pool): Inject<Pool>| Ok::<_, InstantiateErrorKind>(Connection(pool))))])
    .unwrap();

    let connections = spawn_all({
        let container = container.clone();
        move |index| {
            if index % 2 == 0 {
                container.get::<Connection>().unwrap()
            } else {
                Arc::new(Connection(container.get::<Pool>().unwrap()))
            }
        }
    });

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert!(connections.iter().all(|connection| Arc::ptr_eq(&connection.0, &connections[0].0)));
}

#[test]
fn test_multiton_per_argument_across_threads() {
    let produced = Arc::new(AtomicU32::new(0));
    let container = Container::new([Module::new("db").bind(multiton({
        let produced = produced.clone();
        move |size: u32| {
            produced.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InstantiateErrorKind>(Pool(size))
        }
    }))])
    .unwrap();

    let pools = spawn_all({
        let container = container.clone();
        move |index| container.get_with::<Pool, _>((index % 4) as u32).unwrap()
    });

    assert_eq!(produced.load(Ordering::SeqCst), 4);
    for (index, pool) in pools.iter().enumerate() {
        assert_eq!(pool.0, (index % 4) as u32);
        assert!(Arc::ptr_eq(pool, &pools[index % 4]));
    }
}

#[test]
fn test_scoped_singletons_per_context_across_threads() {
    let produced = Arc::new(AtomicU32::new(0));
    let container = Container::new([Module::new("session").bind(
        singleton({
            let produced = produced.clone();
            move || Ok::<_, InstantiateErrorKind>(Pool(produced.fetch_add(1, Ordering::SeqCst)))
        })
        .scoped::<Session>(),
    )])
    .unwrap();

    let contexts: Arc<Vec<_>> = Arc::new((0..4).map(|_| Context::new(Session)).collect());

    let pools = spawn_all({
        let container = container.clone();
        let contexts = contexts.clone();
        move |index| container.on(&contexts[index % 4]).get::<Pool>().unwrap()
    });

    assert_eq!(produced.load(Ordering::SeqCst), 4);
    for (index, pool) in pools.iter().enumerate() {
        assert!(Arc::ptr_eq(pool, &pools[index % 4]));
    }

    for context in contexts.iter() {
        container.close_context(context).unwrap();
    }
    container.on(&contexts[0]).get::<Pool>().unwrap();
    assert_eq!(produced.load(Ordering::SeqCst), 5);
}

#[test]
fn test_close_while_resolving() {
    let produced = Arc::new(AtomicU32::new(0));
    let released = Arc::new(AtomicU32::new(0));
    let container = Container::new([Module::new("session").bind(
        singleton({
            let produced = produced.clone();
            move || Ok::<_, InstantiateErrorKind>(Pool(produced.fetch_add(1, Ordering::SeqCst)))
        })
        .scoped::<Session>()
        .finalizer({
            let released = released.clone();
            move |_: Arc<Pool>| {
                released.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )])
    .unwrap();
    let context = Context::new(Session);

    spawn_all({
        let container = container.clone();
        move |index| {
            for _ in 0..50 {
                if index % 4 == 0 {
                    container.close_context(&context).unwrap();
                } else {
                    container.on(&context).get::<Pool>().unwrap();
                }
            }
        }
    });

    drop(container);
    assert!(released.load(Ordering::SeqCst) >= 1);
    assert_eq!(released.load(Ordering::SeqCst), produced.load(Ordering::SeqCst));
}

#[test]
fn test_instance_built_during_close_released_once() {
    let released = Arc::new(AtomicU32::new(0));
    let started = Arc::new(Barrier::new(2));
    let resume = Arc::new(Barrier::new(2));
    let container = Container::new([Module::new("session").bind(
        singleton({
            let started = started.clone();
            let resume = resume.clone();
            move || {
                started.wait();
                resume.wait();
                Ok::<_, InstantiateErrorKind>(Pool(0))
            }
        })
        .scoped::<Session>()
        .finalizer({
            let released = released.clone();
            move |_: Arc<Pool>| {
                released.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )])
    .unwrap();
    let context = Context::new(Session);

    let handle = thread::spawn({
        let container = container.clone();
        let context = context.clone();
        move || container.on(&context).get::<Pool>().unwrap()
    });

    started.wait();
    container.close_context(&context).unwrap();
    resume.wait();
    handle.join().unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 0);

    container.close_context(&context).unwrap();
    assert_eq!(released.load(Ordering::SeqCst), 1);

    drop(container);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}
