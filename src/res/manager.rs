use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::errors::*;
use crate::sched::Scheduler;
use crate::transport::{
    Address, Endpoint, FileTransport, HttpTransport, Scheme, SchemeResolver, Transport,
};

use super::loader::{FnLoader, Loader};
use super::params::ResourceParams;
use super::registry::{ErasedRegistry, Registry, ResourceState};
use super::request::Request;

/// The `ResourceManager` takes care of loading typed resources asynchronously from the
/// configured address, with one `Registry` per registered type.
pub struct ResourceManager {
    address: RwLock<Address>,
    schemes: RwLock<SchemeResolver>,
    registries: RwLock<HashMap<TypeId, Arc<dyn ErasedRegistry>>>,
    sched: Arc<Scheduler>,
}

impl ResourceManager {
    /// Creates a new `ResourceManager`, with the http, https and file transports attached.
    pub fn new(params: ResourceParams) -> Result<Self> {
        params.validate()?;

        let sched = Scheduler::new(params.workers, None, None)?;
        let http = HttpTransport::new(Duration::from_millis(params.timeout_ms))?;

        let mut schemes = SchemeResolver::new();
        schemes.add(Scheme::Http, http.clone());
        schemes.add(Scheme::Https, http);
        schemes.add(Scheme::File, FileTransport::new(params.root.clone()));

        let address = params.address();
        info!("Resource manager fetches from {}.", address);

        Ok(ResourceManager {
            address: RwLock::new(address),
            schemes: RwLock::new(schemes),
            registries: RwLock::new(HashMap::new()),
            sched: Arc::new(sched),
        })
    }

    /// Sets the address used by all subsequent fetches.
    pub fn configure<T: Into<String>>(&self, scheme: Scheme, host: T, port: u16) {
        let address = Address::new(scheme, host, port);
        info!("Resource manager fetches from {}.", address);
        *write(&self.address) = address;
    }

    /// Gets the address fetches are issued against.
    #[inline]
    pub fn address(&self) -> Address {
        read(&self.address).clone()
    }

    /// Attach or replace the transport of `scheme`.
    pub fn attach<T: Transport>(&self, scheme: Scheme, transport: T) {
        info!("Attaches transport for scheme {}.", scheme);
        write(&self.schemes).add(scheme, transport);
    }

    /// Registers the loader of type `L::Item`.
    pub fn register<L: Loader>(&self, loader: L) -> Result<()> {
        let name = std::any::type_name::<L::Item>();
        let mut registries = write(&self.registries);

        let tid = TypeId::of::<L::Item>();
        if registries.contains_key(&tid) {
            return Err(Error::DuplicateType(name));
        }

        info!("Registers loader of type {}.", name);
        registries.insert(tid, Arc::new(Registry::new(loader)));
        Ok(())
    }

    /// Registers type `T` with a decode and a release function.
    pub fn register_fn<T, D, R>(&self, decode: D, release: R) -> Result<()>
    where
        T: Send + Sync + 'static,
        D: Fn(&[u8]) -> std::result::Result<T, failure::Error> + Send + Sync + 'static,
        R: Fn(&T) -> std::result::Result<(), failure::Error> + Send + Sync + 'static,
    {
        self.register(FnLoader::new(decode, release))
    }

    /// Checks if type `T` has been registered.
    #[inline]
    pub fn is_registered<T: Send + Sync + 'static>(&self) -> bool {
        read(&self.registries).contains_key(&TypeId::of::<T>())
    }

    /// Requests the object of type `T` at `path`, invoking exactly one of the
    /// continuations once it is available.
    ///
    /// Objects stored already are delivered before this method returns. Fails
    /// synchronously if `T` has not been registered, or no transport is attached to
    /// the configured scheme; fetch and decode failures go to `on_failure`.
    pub fn request<T, S, F>(
        &self,
        path: &str,
        re_add: bool,
        on_success: S,
        on_failure: F,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
        S: FnOnce(Arc<T>) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let registry = self.registry::<T>()?;
        let endpoint = self.endpoint()?;

        downcast::<T>(registry.as_ref())
            .request(&endpoint, path, re_add, on_success, on_failure);
        Ok(())
    }

    /// Requests the object of type `T` at `path`. This method returns a `Request`
    /// object immediately, it's the user's responsibility to poll or wait for completion.
    pub fn load<T>(&self, path: &str, re_add: bool) -> Result<Request<T>>
    where
        T: Send + Sync + 'static,
    {
        let latch = Request::latch();
        let req = Request::new(latch.clone());

        let tx = latch.clone();
        self.request::<T, _, _>(
            path,
            re_add,
            move |v| latch.set(Ok(v)),
            move |err| tx.set(Err(err)),
        )?;

        Ok(req)
    }

    /// Removes the object of type `T` stored at `path`.
    pub fn remove<T: Send + Sync + 'static>(&self, path: &str) -> Result<()> {
        self.registry::<T>()?.remove_raw(path)
    }

    /// Checks if the object of type `T` at `path` is stored.
    pub fn has<T: Send + Sync + 'static>(&self, path: &str) -> Result<bool> {
        let registry = self.registry::<T>()?;
        Ok(downcast::<T>(registry.as_ref()).has(path))
    }

    /// Gets the object of type `T` stored at `path`.
    pub fn get<T: Send + Sync + 'static>(&self, path: &str) -> Result<Option<Arc<T>>> {
        let registry = self.registry::<T>()?;
        Ok(downcast::<T>(registry.as_ref()).get(path))
    }

    /// Gets the state of the object of type `T` at `path`.
    pub fn state<T: Send + Sync + 'static>(&self, path: &str) -> Result<ResourceState> {
        let registry = self.registry::<T>()?;
        Ok(downcast::<T>(registry.as_ref()).state(path))
    }

    /// Gets the number of stored objects of type `T`.
    pub fn len<T: Send + Sync + 'static>(&self) -> Result<usize> {
        Ok(self.registry::<T>()?.len())
    }

    /// Stops decoding and storing the fetched payloads of type `T`. Fetches in flight are
    /// not interrupted, their waiters receive `Error::Aborted`.
    pub fn abort<T: Send + Sync + 'static>(&self) -> Result<()> {
        let registry = self.registry::<T>()?;
        info!("Aborts loading of type {}.", registry.name());
        registry.set_abort(true);
        Ok(())
    }

    /// Clears the abort flag of type `T`.
    pub fn resume<T: Send + Sync + 'static>(&self) -> Result<()> {
        self.registry::<T>()?.set_abort(false);
        Ok(())
    }

    fn registry<T: Send + Sync + 'static>(&self) -> Result<Arc<dyn ErasedRegistry>> {
        read(&self.registries)
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| Error::UnknownType(std::any::type_name::<T>()))
    }

    fn endpoint(&self) -> Result<Endpoint> {
        let address = self.address();
        let transport = read(&self.schemes).locate(address.scheme)?;

        Ok(Endpoint {
            address,
            transport,
            sched: self.sched.clone(),
        })
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.sched.terminate();
    }
}

#[inline]
fn downcast<T: Send + Sync + 'static>(registry: &dyn ErasedRegistry) -> &Registry<T> {
    // Registries are keyed by the `TypeId` of their item type.
    match registry.as_any().downcast_ref::<Registry<T>>() {
        Some(v) => v,
        None => unreachable!("registry of {} is keyed by a foreign type", registry.name()),
    }
}

#[inline]
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<T> {
    lock.read().unwrap_or_else(|err| err.into_inner())
}

#[inline]
fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<T> {
    lock.write().unwrap_or_else(|err| err.into_inner())
}
