mod common;

use common::{count, MockPtySystem};
use ptyvisor::effect::{sequence, Effect};
use ptyvisor::{PtyConfig, Supervisor, SupervisorError};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn step(
    calls: &Arc<AtomicUsize>,
    result: Result<&'static str, &'static str>,
) -> Effect<&'static str, &'static str> {
    let calls = Arc::clone(calls);
    Effect::from_fn(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        result
    })
}

#[test]
fn sequence_stops_at_first_failure() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let third = Arc::new(AtomicUsize::new(0));

    let combined = sequence(vec![
        step(&first, Ok("a")),
        step(&second, Err("broken")),
        step(&third, Ok("c")),
    ]);
    assert_eq!(count(&first), 0);

    assert_eq!(combined.run(), Err("broken"));
    assert_eq!(count(&first), 1);
    assert_eq!(count(&second), 1);
    assert_eq!(count(&third), 0);
}

#[test]
fn sequence_of_successes_keeps_order() {
    let calls = Arc::new(AtomicUsize::new(0));
    let combined = sequence(vec![step(&calls, Ok("a")), step(&calls, Ok("b"))]);
    assert_eq!(combined.run(), Ok(vec!["a", "b"]));
    assert_eq!(count(&calls), 2);
}

#[test]
fn spawn_effect_is_lazy_and_not_memoised() {
    let system = MockPtySystem::new();
    let supervisor = Supervisor::new(system.clone());

    let pid = supervisor
        .spawn_effect(&PtyConfig::new("sh"))
        .map(|spawned| spawned.process.pid());
    assert_eq!(count(&system.calls.spawn), 0);

    let first = pid.run().unwrap();
    let second = pid.run().unwrap();
    assert_ne!(first, second);
    assert_eq!(count(&system.calls.spawn), 2);
}

#[test]
fn spawn_then_write_chains_through_the_pty() {
    let system = MockPtySystem::new();
    let supervisor = Supervisor::new(system.clone());

    let greet = supervisor
        .spawn_effect(&PtyConfig::new("cat"))
        .map(|mut spawned| spawned.writer.write_all(b"hello\n"))
        .and_then(|written| match written {
            Ok(()) => Effect::pure("hello\n".len()),
            Err(err) => {
                let message = err.to_string();
                Effect::from_fn(move || {
                    Err(SupervisorError::Io(std::io::Error::other(message.clone())))
                })
            }
        });

    assert_eq!(greet.run().unwrap(), 6);
    assert_eq!(system.written_text(), "hello\n");
}

#[test]
fn spawn_failure_short_circuits_the_chain() {
    let system = MockPtySystem::new();
    system.fail_spawn(true);
    let supervisor = Supervisor::new(system.clone());
    let followups = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&followups);
    let chain = supervisor
        .spawn_effect(&PtyConfig::new("missing"))
        .map(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    assert!(matches!(chain.run(), Err(SupervisorError::Spawn { .. })));
    assert_eq!(count(&followups), 0);
}
