use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use provision_report::container::{provider_fn, Binder, Instance, Scoping, TypeSpec};
use provision_report::{Failure, Injector, Key};

const THREADS: usize = 8;

fn race<F>(injector: &Injector, key: &Key, check: F) -> Vec<String>
where
    F: Fn(&str) + Sync,
{
    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    match injector.get_instance(key) {
                        Ok(_) => "ok".to_string(),
                        Err(err) => {
                            let message = err.to_string();
                            check(&message);
                            message
                        }
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn racing_threads_see_identical_singleton_failures() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let injector = Injector::builder()
        .module(move |b: &mut Binder| {
            let counter = Arc::clone(&counter);
            b.register(
                TypeSpec::new("Consumer", |_args| Ok(Arc::new(()) as Instance))
                    .param("flaky", Key::named("Flaky")),
            );
            b.bind(Key::named("Flaky"))
                .to_provider(
                    "FlakyProvider",
                    provider_fn(move |_ctx| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::thrown("IllegalStateException", Some("not ready".to_string())))
                    }),
                )
                .in_singleton();
        })
        .build()
        .unwrap();

    let messages = race(&injector, &Key::named("Consumer"), |message| {
        assert_eq!(message.matches("while locating").count(), 1);
        assert_eq!(message.matches("via custom provider").count(), 1);
    });

    assert!(messages.iter().all(|m| m == &messages[0]));
    assert!(messages[0].contains("1) [ErrorInCustomProvider]: IllegalStateException: not ready"));
    assert!(messages[0].contains("  at Consumer.<init>\n      \\_ for 1st parameter flaky\n  while locating Consumer"));
    assert_eq!(attempts.load(Ordering::SeqCst), THREADS);
}

#[test]
fn racing_threads_construct_a_singleton_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let injector = Injector::builder()
        .module(move |b: &mut Binder| {
            let counter = Arc::clone(&counter);
            b.register(TypeSpec::new("Cache", move |_args| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::yield_now();
                Ok(Arc::new(()) as Instance)
            }));
            b.bind(Key::named("Cache")).in_singleton();
        })
        .build()
        .unwrap();

    let results = race(&injector, &Key::named("Cache"), |message| {
        panic!("unexpected failure:\n{message}")
    });

    assert!(results.iter().all(|r| r == "ok"));
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn different_singletons_do_not_block_each_other() {
    let injector = Injector::builder()
        .module(|b: &mut Binder| {
            b.register(
                TypeSpec::new("Outer", |_args| Ok(Arc::new(()) as Instance)).param("inner", Key::named("Inner")),
            );
            b.register(TypeSpec::new("Inner", |_args| Ok(Arc::new(()) as Instance)));
            b.bind(Key::named("Outer")).in_singleton();
            b.bind(Key::named("Inner")).in_singleton();
        })
        .build()
        .unwrap();

    let results = race(&injector, &Key::named("Outer"), |message| panic!("{message}"));
    assert!(results.iter().all(|r| r == "ok"));
    assert!(injector.get_instance(&Key::named("Inner")).is_ok());
}

#[test]
fn crossing_singleton_lookups_report_a_cycle_instead_of_deadlocking() {
    let both_started = Arc::new(Barrier::new(2));
    let injector = {
        let both_started = Arc::clone(&both_started);
        Injector::builder()
            .module(move |b: &mut Binder| {
                for (mine, theirs) in [("Alpha", "Beta"), ("Beta", "Alpha")] {
                    let both_started = Arc::clone(&both_started);
                    let first_call = AtomicBool::new(true);
                    b.provides(
                        Key::named(mine),
                        Scoping::Singleton,
                        provider_fn(move |ctx| {
                            if first_call.swap(false, Ordering::SeqCst) {
                                both_started.wait();
                            }
                            Ok(ctx.get_instance(&Key::named(theirs))?)
                        }),
                    );
                }
            })
            .build()
            .unwrap()
    };
    let injector = Arc::new(injector);

    let (tx, rx) = mpsc::channel();
    for name in ["Alpha", "Beta"] {
        let injector = Arc::clone(&injector);
        let tx = tx.clone();
        thread::spawn(move || {
            let outcome = injector.get_instance(&Key::named(name)).map(|_| ()).map_err(|e| e.to_string());
            let _ = tx.send(outcome);
        });
    }

    for _ in 0..2 {
        let outcome = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("singleton lookups deadlocked");
        let message = outcome.unwrap_err();
        assert!(message.contains("[CircularDependency]: Found a circular dependency involving"), "{message}");
        assert_eq!(message.matches("Unable to provision").count(), 1);
    }
}
