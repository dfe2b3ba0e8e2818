use breaker_core::breaker::{Breaker, BreakerError, Failure, FailureKind, Rule, State};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn unreachable_backend() -> Result<&'static str, Failure> {
    Err(Failure::msg(FailureKind::Connection, "backend unreachable"))
}

// The full protective cycle against the real timer: trip, probe, retrip on a
// failed probe, recover on a successful one.
#[test]
fn trip_probe_retrip_recover() {
    let breaker = Breaker::new(Rule::new(5, 500)).unwrap();

    for _ in 0..5 {
        assert!(breaker.execute(unreachable_backend).is_err());
    }
    assert_eq!(breaker.current_state(), State::Open);
    assert_eq!(breaker.service_level(), 0.0);

    thread::sleep(Duration::from_millis(600));
    assert_eq!(breaker.current_state(), State::HalfOpen);

    // failed probe: back to open, the saturated counter stays where it was
    assert!(breaker.execute(unreachable_backend).is_err());
    assert_eq!(breaker.current_state(), State::Open);
    assert_eq!(breaker.service_level(), 0.0);

    thread::sleep(Duration::from_millis(600));
    assert_eq!(breaker.current_state(), State::HalfOpen);

    // successful probe: recovery confirmed
    assert_eq!(breaker.execute(|| Ok("pong")).unwrap(), "pong");
    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.service_level(), 100.0);
    assert_eq!(breaker.failure_count(), 0);
}

#[test]
fn open_breaker_rejects_without_invoking() {
    let breaker = Breaker::new(Rule::new(1, 60_000)).unwrap();
    let _ = breaker.execute(unreachable_backend);
    assert_eq!(breaker.current_state(), State::Open);

    let res = breaker.execute(|| -> Result<(), Failure> {
        panic!("the wrapped operation must not run while open")
    });
    assert!(matches!(res, Err(BreakerError::Open)));
}

#[test]
fn ignored_kind_propagates_verbatim() {
    let breaker = Breaker::new(Rule::new(2, 60_000)).unwrap();
    breaker.add_ignored_kind(FailureKind::Protocol);

    // sit at threshold - 1, then hit the ignored kind repeatedly
    let _ = breaker.execute(unreachable_backend);
    for _ in 0..10 {
        let res = breaker
            .execute(|| -> Result<(), Failure> { Err(Failure::msg(FailureKind::Protocol, "bad frame")) });
        match res {
            Err(err @ BreakerError::Ignored(_)) => assert_eq!(err.to_string(), "bad frame"),
            other => panic!("unexpected outcome: {:?}", other.err()),
        }
    }
    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.failure_count(), 1);
}

#[test]
fn concurrent_failures_count_exactly_once_each() {
    let breaker = Arc::new(Breaker::new(Rule::new(1_000, 60_000)).unwrap());
    let mut handles = Vec::new();
    for _ in 0..10 {
        let breaker = Arc::clone(&breaker);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let _ = breaker.execute(unreachable_backend);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    // 500 failures, well below the threshold: every one of them must be counted
    assert_eq!(breaker.failure_count(), 500);
    assert_eq!(breaker.current_state(), State::Closed);
}

#[test]
fn concurrent_mixed_outcomes_keep_counter_in_range() {
    use rand::Rng;

    let breaker = Arc::new(Breaker::new(Rule::new(50, 60_000)).unwrap());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let breaker = Arc::clone(&breaker);
        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..100 {
                let _ = breaker.execute(|| -> Result<(), Failure> {
                    if rng.gen_bool(0.5) {
                        Ok(())
                    } else {
                        Err(Failure::msg(FailureKind::Timeout, "deadline exceeded"))
                    }
                });
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(breaker.failure_count() <= breaker.failure_threshold());
    assert!(breaker.service_level() >= 0.0 && breaker.service_level() <= 100.0);
}

#[test]
fn close_is_idempotent() {
    let breaker = Breaker::new(Rule::new(5, 60_000)).unwrap();
    breaker.close();
    breaker.close();
    // a closed-down breaker still counts, it only lost automatic recovery
    let _ = breaker.execute(unreachable_backend);
    assert_eq!(breaker.failure_count(), 1);
}

#[cfg(feature = "async")]
mod asynchronous {
    use super::*;

    #[tokio::test]
    async fn execute_async_drives_the_same_machine() {
        let breaker = Breaker::new(Rule::new(2, 60_000)).unwrap();

        for _ in 0..2 {
            let res = breaker
                .execute_async(|| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    unreachable_backend()
                })
                .await;
            assert!(matches!(res, Err(BreakerError::Operation(_))));
        }
        assert_eq!(breaker.current_state(), State::Open);

        let res = breaker.execute_async(|| async { Ok(1u32) }).await;
        assert!(matches!(res, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn execute_async_success_recovers_service_level() {
        let breaker = Breaker::new(Rule::new(5, 60_000)).unwrap();
        let _ = breaker.execute_async(|| async { unreachable_backend() }).await;
        assert_eq!(breaker.service_level(), 80.0);

        let res = breaker.execute_async(|| async { Ok("pong") }).await;
        assert_eq!(res.unwrap(), "pong");
        assert_eq!(breaker.service_level(), 100.0);
    }

    #[tokio::test]
    async fn shared_across_tasks() {
        let breaker = Arc::new(Breaker::new(Rule::new(100, 60_000)).unwrap());
        let mut tasks = Vec::new();
        for i in 0..20u32 {
            let breaker = Arc::clone(&breaker);
            tasks.push(tokio::spawn(async move {
                breaker
                    .execute_async(|| async move {
                        if i % 2 == 0 {
                            Ok(i)
                        } else {
                            Err(Failure::msg(FailureKind::Timeout, "deadline exceeded"))
                        }
                    })
                    .await
            }));
        }
        for task in tasks {
            let _ = task.await.unwrap();
        }
        assert!(breaker.failure_count() <= 10);
        assert_eq!(breaker.current_state(), State::Closed);
    }
}
