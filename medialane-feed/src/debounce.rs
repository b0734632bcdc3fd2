use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{sleep, Instant},
};

/// Runs the most recently scheduled action once `delay` has passed without
/// another one being scheduled.
///
/// Delay tasks run on the tokio runtime current at scheduling time, or else on
/// the one current when the debouncer was created. Without any runtime there
/// is no timer, and actions run immediately.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    runtime: Option<Handle>,

    /// Bumped on every schedule and cancel; an action only fires if its
    /// ticket is still the latest when the delay expires.
    generation: Arc<AtomicU64>,

    /// Delay task of the pending action, aborted when superseded.
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Handed to a fired action. Goes stale once the debouncer is rescheduled or
/// cancelled; actions that publish state re-check it under their own lock.
#[derive(Clone, Debug)]
pub struct Ticket {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            runtime: Handle::try_current().ok(),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any pending action and schedules `action` after the delay.
    /// A zero delay runs the action immediately.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce(Ticket) + Send + 'static,
    {
        let ticket = Ticket {
            id: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            generation: Arc::clone(&self.generation),
        };
        let runtime = Handle::try_current().ok().or_else(|| self.runtime.clone());
        let runtime = match runtime {
            Some(runtime) if !self.delay.is_zero() => runtime,
            runtime => {
                if runtime.is_none() {
                    log::debug!("no tokio runtime, running debounced action {} now", ticket.id);
                }
                self.abort_pending();
                action(ticket);
                return;
            }
        };

        let delay = self.delay;
        let handle = runtime.spawn(async move {
            let time = Instant::now();
            sleep(delay).await;
            if !ticket.is_current() {
                log::debug!("debounced action {} superseded", ticket.id);
                return;
            }
            log::debug!("debounced action {} fired after {:?}", ticket.id, time.elapsed());
            action(ticket);
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Cancels the pending action. Returns true if one had not fired yet.
    pub fn cancel(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_pending()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    fn abort_pending(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                running
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Action = Box<dyn FnOnce(Ticket) + Send>;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Action) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let make = move |value: &'static str| -> Action {
            let sink = Arc::clone(&sink);
            Box::new(move |_ticket| sink.lock().unwrap().push(value))
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn only_last_action_fires() {
        let (fired, make) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(make("n"));
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule(make("no"));
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule(make("nova"));
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(299)).await;
        assert!(fired.lock().unwrap().is_empty());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["nova"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_action() {
        let (fired, make) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(make("nova"));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_secs(1)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_actions_all_fire() {
        let (fired, make) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(50));

        debouncer.schedule(make("a"));
        sleep(Duration::from_millis(60)).await;
        debouncer.schedule(make("b"));
        sleep(Duration::from_millis(60)).await;
        assert_eq!(*fired.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn zero_delay_runs_inline() {
        let (fired, make) = recorder();
        let debouncer = Debouncer::new(Duration::ZERO);
        debouncer.schedule(make("now"));
        assert_eq!(*fired.lock().unwrap(), vec!["now"]);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn runs_inline_without_runtime() {
        let (fired, make) = recorder();
        let debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.schedule(make("nova"));
        assert_eq!(*fired.lock().unwrap(), vec!["nova"]);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn spawns_on_runtime_it_was_created_in() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let debouncer = {
            let _guard = runtime.enter();
            Debouncer::new(Duration::from_millis(20))
        };

        // scheduled from a thread outside the runtime
        let (fired, make) = recorder();
        debouncer.schedule(make("nova"));
        assert!(fired.lock().unwrap().is_empty());

        for _ in 0..200 {
            if !fired.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*fired.lock().unwrap(), vec!["nova"]);
    }

    #[test]
    fn ticket_goes_stale_on_cancel_and_reschedule() {
        let debouncer = Debouncer::new(Duration::ZERO);
        let held = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&held);
        debouncer.schedule(move |ticket| *slot.lock().unwrap() = Some(ticket));
        let ticket = held.lock().unwrap().take().unwrap();
        assert!(ticket.is_current());

        debouncer.cancel();
        assert!(!ticket.is_current());

        let slot = Arc::clone(&held);
        debouncer.schedule(move |ticket| *slot.lock().unwrap() = Some(ticket));
        let newer = held.lock().unwrap().take().unwrap();
        assert!(newer.is_current());
        assert!(!ticket.is_current());
    }
}
