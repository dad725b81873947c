use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_deque::{Injector, Steal};

use crate::errors::*;

use super::latch::{CountLatch, Latch};
use super::unwind;

/// The type for a panic handling closure. Note that this same closure
/// may be invoked multiple times in parallel.
pub type PanicHandler = dyn Fn(Box<dyn std::any::Any + Send>) + Send + Sync;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads which executes spawned jobs in FIFO order.
///
/// A scheduler without any worker thread is _headless_, it executes every job
/// on the calling thread immediately.
pub struct Scheduler {
    shared: Option<Arc<Shared>>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

struct Shared {
    injector: Injector<Job>,
    watcher: Watcher,
    // One count for the pool itself plus one for every job not finished yet.
    terminator: CountLatch,
    terminating: RwLock<bool>,
    panic_handler: Option<Box<PanicHandler>>,
}

impl Scheduler {
    /// Creates a scheduler with `num` worker threads.
    pub fn new(
        num: u32,
        stack_size: Option<usize>,
        panic_handler: Option<Box<PanicHandler>>,
    ) -> Result<Self> {
        if num == 0 {
            return Ok(Scheduler::headless());
        }

        let shared = Arc::new(Shared {
            injector: Injector::new(),
            watcher: Watcher(Mutex::new(()), Condvar::new()),
            terminator: CountLatch::new(),
            terminating: RwLock::new(false),
            panic_handler,
        });

        let mut threads = Vec::with_capacity(num as usize);
        for i in 0..num {
            let mut b = thread::Builder::new().name(format!("asset-fetch-{}", i));
            if let Some(stack_size) = stack_size {
                b = b.stack_size(stack_size);
            }

            let sc = shared.clone();
            let handle = b
                .spawn(move || Scheduler::main_loop(&sc))
                .map_err(|err| Error::Config(format!("could not spawn worker thread: {}", err)))?;
            threads.push(handle);
        }

        debug!("Scheduler starts with {} worker threads.", num);
        Ok(Scheduler {
            shared: Some(shared),
            threads: Mutex::new(threads),
        })
    }

    /// Creates a scheduler which runs every job on the calling thread.
    pub fn headless() -> Self {
        Scheduler {
            shared: None,
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Spawn an asynchronous job. Jobs spawned after `terminate` run on the
    /// calling thread.
    pub fn spawn<F>(&self, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = match self.shared {
            Some(ref shared) => shared,
            None => return func(),
        };

        let terminating = shared
            .terminating
            .read()
            .unwrap_or_else(|err| err.into_inner());

        if *terminating {
            drop(terminating);
            return func();
        }

        // Ensure that scheduler cannot terminate until this job has executed. This
        // ref is decremented at the (*) below.
        shared.terminator.increment();

        let sc = shared.clone();
        shared.injector.push(Box::new(move || {
            if let Err(err) = unwind::halt_unwinding(func) {
                sc.handle_panic(err);
            }

            sc.terminator.set(); // (*) permit scheduler to terminate now
        }));

        drop(terminating);
        shared.watcher.notify_one();
    }

    /// Signals that the owner of this scheduler has been dropped. Blocks current
    /// thread until all the workers finished their jobs gracefully.
    pub fn terminate(&self) {
        let shared = match self.shared {
            Some(ref shared) => shared,
            None => return,
        };

        {
            let mut terminating = shared
                .terminating
                .write()
                .unwrap_or_else(|err| err.into_inner());

            if !*terminating {
                *terminating = true;
                shared.terminator.set();
            }
        }

        shared.watcher.notify_all();

        let current = thread::current().id();
        let threads: Vec<_> = self
            .threads
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .drain(..)
            .collect();

        // A job could drop the last owner of its own scheduler. Its siblings keep
        // running until that job returns, so the workers are detached instead.
        if threads.iter().any(|v| v.thread().id() == current) {
            debug!("Scheduler terminates from its own worker thread.");
            return;
        }

        for v in threads {
            if v.join().is_err() {
                warn!("Worker thread of scheduler exits abnormally.");
            }
        }
    }

    fn main_loop(shared: &Shared) {
        let mut ms = 1;

        loop {
            match shared.injector.steal() {
                Steal::Success(job) => {
                    job();
                    ms = 1;
                }
                Steal::Retry => {}
                Steal::Empty => {
                    if shared.terminator.is_set() {
                        break;
                    }

                    shared.watcher.wait_timeout(ms);
                    ms = (ms * 2).min(48);
                }
            }
        }

        // Wakes up the siblings, so they could notice the termination too.
        shared.watcher.notify_all();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl Shared {
    fn handle_panic(&self, err: Box<dyn std::any::Any + Send>) {
        match self.panic_handler {
            Some(ref handler) => handler(err),
            None => error!("Job panicked: {}", unwind::describe(err.as_ref())),
        }
    }
}

struct Watcher(Mutex<()>, Condvar);

impl Watcher {
    #[inline]
    fn wait_timeout(&self, ms: u64) {
        let duration = Duration::from_millis(ms);
        let v = self.0.lock().unwrap_or_else(|err| err.into_inner());
        let _ = self.1.wait_timeout(v, duration);
    }

    #[inline]
    fn notify_one(&self) {
        self.1.notify_one()
    }

    #[inline]
    fn notify_all(&self) {
        self.1.notify_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn spawn() {
        let sched = Scheduler::new(4, None, None).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let (tx, rx) = mpsc::channel();
        for _ in 0..64 {
            let counter = counter.clone();
            let tx = tx.clone();
            sched.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            });
        }

        for _ in 0..64 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn terminate_drains_pending_jobs() {
        let sched = Scheduler::new(2, None, None).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..32 {
            let counter = counter.clone();
            sched.spawn(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        sched.terminate();
        assert_eq!(counter.load(Ordering::SeqCst), 32);

        // Jobs spawned after termination run inline.
        let c = counter.clone();
        sched.spawn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 33);
    }

    #[test]
    fn panic_handler() {
        let panics = Arc::new(AtomicUsize::new(0));
        let p = panics.clone();
        let handler: Box<PanicHandler> = Box::new(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        let sched = Scheduler::new(1, None, Some(handler)).unwrap();
        sched.spawn(|| panic!("boom"));

        let (tx, rx) = mpsc::channel();
        sched.spawn(move || tx.send(()).unwrap());
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        sched.terminate();
        assert_eq!(panics.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn headless() {
        let sched = Scheduler::headless();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        sched.spawn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
