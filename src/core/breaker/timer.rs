use crate::logging;
use std::sync::{Arc, Condvar, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

// An embedder that cannot spawn threads hits this on every trip; log the
// first occurrence only.
static SPAWN_ERROR_ONCE: Once = Once::new();

/// One-shot, restartable countdown driving the breaker's open-to-half-open
/// recovery probe.
///
/// `start` arms the countdown and supersedes any countdown still pending;
/// `stop` disarms it. The elapsed callback fires at most once per `start` and
/// runs on the timer's own context, never on the caller's thread.
pub trait RecoveryTimer: Send + Sync {
    fn start(&self, timeout: Duration, on_elapsed: Box<dyn FnOnce() + Send>);
    fn stop(&self);
}

/// The default [`RecoveryTimer`]: a condvar-backed countdown on a spawned
/// thread.
///
/// Every armed countdown carries the generation it was started under; `stop`
/// and restarts bump the generation and wake the waiter, so a superseded
/// countdown exits early instead of sleeping out its deadline.
#[derive(Debug, Default)]
pub struct ThreadTimer {
    sync: Arc<(Mutex<u64>, Condvar)>,
}

impl RecoveryTimer for ThreadTimer {
    fn start(&self, timeout: Duration, on_elapsed: Box<dyn FnOnce() + Send>) {
        let sync = Arc::clone(&self.sync);
        let my_generation = {
            let (generation, waker) = &*self.sync;
            let mut generation = generation.lock().unwrap();
            *generation += 1;
            waker.notify_all();
            *generation
        };
        let spawned = thread::Builder::new()
            .name("breaker-recovery-timer".into())
            .spawn(move || {
                let (lock, waker) = &*sync;
                let deadline = Instant::now() + timeout;
                let mut generation = lock.lock().unwrap();
                while *generation == my_generation {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _) = waker.wait_timeout(generation, deadline - now).unwrap();
                    generation = guard;
                }
                let elapsed = *generation == my_generation;
                drop(generation);
                if elapsed {
                    on_elapsed();
                }
            });
        if let Err(err) = spawned {
            SPAWN_ERROR_ONCE.call_once(|| {
                logging::error!("fail to spawn the recovery timer thread: {:?}", err);
            });
        }
    }

    fn stop(&self) {
        let (generation, waker) = &*self.sync;
        let mut generation = generation.lock().unwrap();
        *generation += 1;
        waker.notify_all();
    }
}

type ArmedCountdown = (Duration, Box<dyn FnOnce() + Send>);

/// A deterministic [`RecoveryTimer`] for tests: it never fires on its own, the
/// test decides when the countdown "elapses" by calling [`ManualTimer::fire`].
#[derive(Default)]
pub struct ManualTimer {
    armed: Mutex<Option<ArmedCountdown>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a countdown is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.lock().unwrap().is_some()
    }

    /// The timeout the countdown was armed with, if any.
    pub fn armed_timeout(&self) -> Option<Duration> {
        self.armed.lock().unwrap().as_ref().map(|(timeout, _)| *timeout)
    }

    /// Runs the armed callback, disarming the countdown. Returns false when
    /// nothing was armed.
    pub fn fire(&self) -> bool {
        let countdown = self.armed.lock().unwrap().take();
        match countdown {
            Some((_, on_elapsed)) => {
                on_elapsed();
                true
            }
            None => false,
        }
    }
}

impl RecoveryTimer for ManualTimer {
    fn start(&self, timeout: Duration, on_elapsed: Box<dyn FnOnce() + Send>) {
        *self.armed.lock().unwrap() = Some((timeout, on_elapsed));
    }

    fn stop(&self) {
        self.armed.lock().unwrap().take();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::mpsc;

    #[test]
    fn thread_timer_fires_after_timeout() {
        let timer = ThreadTimer::default();
        let (tx, rx) = mpsc::channel();
        timer.start(
            Duration::from_millis(20),
            Box::new(move || tx.send(()).unwrap()),
        );
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_ok());
    }

    #[test]
    fn thread_timer_stop_cancels() {
        let timer = ThreadTimer::default();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        timer.start(
            Duration::from_millis(50),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        timer.stop();
        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn thread_timer_restart_supersedes() {
        let timer = ThreadTimer::default();
        let (tx, rx) = mpsc::channel();
        let stale = tx.clone();
        timer.start(Duration::from_millis(30), Box::new(move || stale.send(1).unwrap()));
        timer.start(Duration::from_millis(60), Box::new(move || tx.send(2).unwrap()));
        // only the second countdown is allowed to fire
        assert_eq!(rx.recv_timeout(Duration::from_millis(500)), Ok(2));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn manual_timer_is_inert_until_fired() {
        let timer = ManualTimer::new();
        assert!(!timer.is_armed());
        assert!(!timer.fire());

        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        timer.start(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(timer.is_armed());
        assert_eq!(timer.armed_timeout(), Some(Duration::from_millis(10)));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert!(timer.fire());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[test]
    fn manual_timer_stop_disarms() {
        let timer = ManualTimer::new();
        timer.start(Duration::from_millis(10), Box::new(|| panic!("must not fire")));
        timer.stop();
        assert!(!timer.fire());
    }
}
