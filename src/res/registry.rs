//! # Registry
//!
//! The `Registry` keeps the decoded objects of one resource type, and makes sure that
//! a path is fetched at most once at any given time.
//!
//! Every path is in one of three states: absent, fetching (an entry in `in_flight`)
//! or ready (an entry in `store`). Requests to a fetching path are parked as
//! _waiters_ of that fetch, and all of them receive its outcome in the order they
//! arrived. A failed fetch leaves no trace, so the next request starts from scratch.
//!
//! ## Re-adding
//!
//! Requesting with `re_add` always issues a new fetch. If another fetch of that path
//! is still in flight, the new one supersedes it: its waiters stay parked and receive
//! the outcome of the newer fetch, the result of the older one is discarded once it
//! arrives. A ready object keeps serving requests until the newer fetch succeeds and
//! replaces it. Objects are only ever released by an explicit `remove`; a replaced or
//! discarded one is merely dropped, as callers could still hold it.
//!
//! ## Abort
//!
//! Aborting is cooperative. Fetches already issued are never interrupted, but their
//! payloads are no longer decoded or stored; waiters receive `Error::Aborted` instead.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::*;
use crate::sched::unwind;
use crate::transport::Endpoint;

use super::loader::Loader;
use super::request::Response;

/// The observable state of a path in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceState {
    Absent,
    Fetching,
    Ready,
}

/// The capabilities shared by registries of all types, used by the
/// `ResourceManager` to handle them without knowing their item type.
pub trait ErasedRegistry: Send + Sync + 'static {
    /// The name of the item type of this registry.
    fn name(&self) -> &'static str;

    /// Removes the object stored at `path`.
    fn remove_raw(&self, path: &str) -> Result<()>;

    /// Sets or clears the abort flag.
    fn set_abort(&self, abort: bool);

    /// Gets the number of stored objects.
    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// The registry of one resource type.
pub struct Registry<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
}

struct Shared<T: Send + Sync + 'static> {
    name: &'static str,
    loader: Box<dyn Loader<Item = T>>,
    payload: Mutex<Payload<T>>,
    cancel_requested: AtomicBool,
}

struct Payload<T> {
    in_flight: HashMap<String, Flight<T>>,
    store: HashMap<String, Arc<T>>,
    generations: u64,
}

struct Flight<T> {
    generation: u64,
    // Set once the outcome has been taken for delivery. Waiters parked after that
    // point are served by a fresh fetch.
    settled: bool,
    waiters: Vec<Waiter<T>>,
}

struct Waiter<T> {
    on_success: Box<dyn FnOnce(Arc<T>) + Send>,
    on_failure: Box<dyn FnOnce(Error) + Send>,
}

impl<T> Waiter<T> {
    fn resolve(self, rsp: Response<T>) {
        match rsp {
            Ok(v) => (self.on_success)(v),
            Err(err) => (self.on_failure)(err),
        }
    }
}

impl<T> Flight<T> {
    #[inline]
    fn is_pending(&self) -> bool {
        !self.settled || !self.waiters.is_empty()
    }
}

impl<T> Payload<T> {
    #[inline]
    fn next_generation(&mut self) -> u64 {
        self.generations += 1;
        self.generations
    }
}

impl<T: Send + Sync + 'static> Registry<T> {
    /// Creates a new and empty `Registry` bound to `loader`.
    pub fn new<L: Loader<Item = T>>(loader: L) -> Self {
        let shared = Shared {
            name: std::any::type_name::<T>(),
            loader: Box::new(loader),
            payload: Mutex::new(Payload {
                in_flight: HashMap::new(),
                store: HashMap::new(),
                generations: 0,
            }),
            cancel_requested: AtomicBool::new(false),
        };

        Registry {
            shared: Arc::new(shared),
        }
    }

    /// Requests the object at `path`.
    ///
    /// If the object is stored already, `on_success` is invoked on the calling thread
    /// before returning. Otherwise the continuation is parked until the fetch of `path`
    /// resolves, and a fetch is issued through `endpoint` unless one is in flight
    /// already (or `re_add` is set).
    pub fn request<S, F>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        re_add: bool,
        on_success: S,
        on_failure: F,
    ) where
        S: FnOnce(Arc<T>) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let waiter = Waiter {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        };

        let generation = {
            let mut guard = self.shared.lock();
            let payload = &mut *guard;

            if !re_add {
                if let Some(v) = payload.store.get(path).cloned() {
                    drop(guard);
                    debug!("Cache hit of {} {}.", self.shared.name, path);
                    return (waiter.on_success)(v);
                }
            }

            match payload.in_flight.get_mut(path) {
                Some(flight) if !flight.settled && !re_add => {
                    flight.waiters.push(waiter);
                    return;
                }
                Some(flight) if !flight.settled => {
                    // Supersedes the outstanding fetch.
                    payload.generations += 1;
                    flight.generation = payload.generations;
                    flight.waiters.push(waiter);
                    flight.generation
                }
                Some(flight) => {
                    // The previous fetch is delivering its outcome, the one who finishes
                    // the delivery starts another fetch for this waiter.
                    flight.waiters.push(waiter);
                    return;
                }
                None => {
                    let generation = payload.next_generation();
                    let flight = Flight {
                        generation,
                        settled: false,
                        waiters: vec![waiter],
                    };

                    payload.in_flight.insert(path.to_owned(), flight);
                    generation
                }
            }
        };

        self.shared
            .clone()
            .dispatch(endpoint.clone(), path.to_owned(), generation);
    }

    /// Checks if the object at `path` is stored.
    #[inline]
    pub fn has(&self, path: &str) -> bool {
        self.shared.lock().store.contains_key(path)
    }

    /// Gets the object stored at `path`.
    #[inline]
    pub fn get(&self, path: &str) -> Option<Arc<T>> {
        self.shared.lock().store.get(path).cloned()
    }

    /// Gets the state of `path`.
    pub fn state(&self, path: &str) -> ResourceState {
        let payload = self.shared.lock();

        if payload
            .in_flight
            .get(path)
            .map(|v| v.is_pending())
            .unwrap_or(false)
        {
            ResourceState::Fetching
        } else if payload.store.contains_key(path) {
            ResourceState::Ready
        } else {
            ResourceState::Absent
        }
    }

    /// Removes the object stored at `path`, releasing it with the loader.
    ///
    /// Fails with `Busy` if `path` is being fetched, and with `NotFound` if nothing is
    /// stored there.
    pub fn remove(&self, path: &str) -> Result<()> {
        let v = {
            let mut payload = self.shared.lock();

            if payload
                .in_flight
                .get(path)
                .map(|v| v.is_pending())
                .unwrap_or(false)
            {
                return Err(Error::Busy(path.to_owned()));
            }

            payload
                .store
                .remove(path)
                .ok_or_else(|| Error::NotFound(path.to_owned()))?
        };

        self.shared.release(path, &v);
        Ok(())
    }

    /// Requests to stop acting on the results of fetches.
    #[inline]
    pub fn abort(&self) {
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Clears the abort flag.
    #[inline]
    pub fn resume(&self) {
        self.shared.cancel_requested.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::SeqCst)
    }

    /// Gets the number of stored objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.lock().store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send + Sync + 'static> ErasedRegistry for Registry<T> {
    fn name(&self) -> &'static str {
        self.shared.name
    }

    fn remove_raw(&self, path: &str) -> Result<()> {
        self.remove(path)
    }

    fn set_abort(&self, abort: bool) {
        if abort {
            self.abort();
        } else {
            self.resume();
        }
    }

    fn len(&self) -> usize {
        Registry::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: Send + Sync + 'static> Shared<T> {
    #[inline]
    fn lock(&self) -> MutexGuard<Payload<T>> {
        self.payload.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn dispatch(self: Arc<Self>, endpoint: Endpoint, path: String, generation: u64) {
        let on_success = {
            let shared = self.clone();
            let endpoint = endpoint.clone();
            let path = path.clone();
            move |bytes: Vec<u8>| shared.complete(endpoint, path, generation, Ok(bytes))
        };

        let on_failure = {
            let shared = self;
            let endpoint = endpoint.clone();
            let path = path.clone();
            move |err| shared.complete(endpoint, path, generation, Err(err))
        };

        endpoint.fetch_async(path, on_success, on_failure);
    }

    fn is_current(&self, path: &str, generation: u64) -> bool {
        match self.lock().in_flight.get(path) {
            Some(flight) => flight.generation == generation && !flight.settled,
            None => false,
        }
    }

    fn complete(
        self: Arc<Self>,
        endpoint: Endpoint,
        path: String,
        generation: u64,
        rsp: Result<Vec<u8>>,
    ) {
        if !self.is_current(&path, generation) {
            debug!("Discards superseded fetch of {} {}.", self.name, path);
            return;
        }

        let rsp: Response<T> = match rsp {
            Ok(_) if self.cancel_requested.load(Ordering::SeqCst) => {
                Err(Error::Aborted(path.clone()))
            }
            Ok(bytes) => match unwind::halt_unwinding(|| self.loader.decode(&bytes)) {
                Ok(Ok(v)) => Ok(Arc::new(v)),
                Ok(Err(err)) => {
                    warn!("Failed to decode {} {}: {}", self.name, path, err);
                    Err(Error::DecodeFailure(format!("{} ({})", path, err)))
                }
                Err(panic) => {
                    let msg = unwind::describe(panic.as_ref()).to_owned();
                    warn!("Decoder of {} panicked on {}: {}", self.name, path, msg);
                    Err(Error::DecodeFailure(format!("{} ({})", path, msg)))
                }
            },
            Err(err) => Err(err),
        };

        let (waiters, replaced) = {
            let mut guard = self.lock();
            let payload = &mut *guard;

            let flight = match payload.in_flight.get_mut(&path) {
                Some(flight) if flight.generation == generation && !flight.settled => flight,
                _ => {
                    // Superseded while decoding.
                    drop(guard);
                    debug!("Discards superseded fetch of {} {}.", self.name, path);
                    return;
                }
            };

            flight.settled = true;
            let waiters = std::mem::replace(&mut flight.waiters, Vec::new());

            // A replaced object is dropped without `release`, callers could still hold it.
            let replaced = match rsp {
                Ok(ref v) => payload.store.insert(path.clone(), v.clone()),
                Err(_) => None,
            };

            (waiters, replaced)
        };

        drop(replaced);

        match rsp {
            Ok(_) => debug!("Loaded {} {}.", self.name, path),
            Err(ref err) => warn!("Failed to load {} {}: {}", self.name, path, err),
        }

        for v in waiters {
            let rsp = rsp.clone();
            if let Err(panic) = unwind::halt_unwinding(move || v.resolve(rsp)) {
                error!(
                    "Continuation of {} {} panicked: {}",
                    self.name,
                    path,
                    unwind::describe(panic.as_ref())
                );
            }
        }

        // Leaves the fetching state, unless someone arrived during the delivery.
        let restart = {
            let mut guard = self.lock();
            let payload = &mut *guard;

            let pending = match payload.in_flight.get(&path) {
                Some(flight) if flight.generation == generation => !flight.waiters.is_empty(),
                _ => return,
            };

            if pending {
                let next = payload.next_generation();
                if let Some(flight) = payload.in_flight.get_mut(&path) {
                    flight.generation = next;
                    flight.settled = false;
                }

                Some(next)
            } else {
                payload.in_flight.remove(&path);
                None
            }
        };

        if let Some(next) = restart {
            self.dispatch(endpoint, path, next);
        }
    }

    fn release(&self, path: &str, v: &T) {
        if let Err(err) = self.loader.release(v) {
            warn!("Failed to release {} {}: {}", self.name, path, err);
        }
    }
}
