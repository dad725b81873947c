//! Single-shot fetches of opaque byte payloads.
//!
//! A `Transport` performs exactly one request against an `Address` and either returns
//! the full payload or fails. It never retries. The free functions `fetch` and
//! `fetch_async` wrap it into the two-continuation form used by the registries:
//! exactly one of `on_success` or `on_failure` is invoked, exactly once.

pub mod file;
pub mod http;

pub use self::file::FileTransport;
pub use self::http::HttpTransport;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::sched::unwind;
use crate::sched::Scheduler;

/// The URI schemes a transport could be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
    File,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::File => "file",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            "file" => Ok(Scheme::File),
            _ => Err(Error::UnsupportedScheme(s.to_owned())),
        }
    }
}

/// The network endpoint shared by all the fetches of a `ResourceManager`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new<T: Into<String>>(scheme: Scheme, host: T, port: u16) -> Self {
        Address {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Composes the full URL of resource `path` at this address.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme,
            self.host,
            self.port,
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A blocking, single-shot fetch of the payload located at `path`.
///
/// Connection errors, unsuccessful statuses, malformed responses and timeouts are
/// all reported as `Error::TransportFailure`.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, address: &Address, path: &str) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch(&self, address: &Address, path: &str) -> Result<Vec<u8>> {
        (**self).fetch(address, path)
    }
}

/// Fetches the payload on the calling thread, and returns after one of the
/// continuations has run. A panicking transport counts as a failed fetch.
pub fn fetch<T, S, F>(transport: &T, address: &Address, path: &str, on_success: S, on_failure: F)
where
    T: Transport + ?Sized,
    S: FnOnce(Vec<u8>),
    F: FnOnce(Error),
{
    let rsp = match unwind::halt_unwinding(|| transport.fetch(address, path)) {
        Ok(rsp) => rsp,
        Err(panic) => Err(Error::TransportFailure(format!(
            "{} ({})",
            address.url(path),
            unwind::describe(panic.as_ref())
        ))),
    };

    match rsp {
        Ok(bytes) => on_success(bytes),
        Err(err) => {
            warn!("Failed to fetch {}: {}", address.url(path), err);
            on_failure(err)
        }
    }
}

/// Fetches the payload on a worker thread of `sched` and returns immediately. The
/// continuation runs on that worker thread.
pub fn fetch_async<S, F>(
    sched: &Scheduler,
    transport: Arc<dyn Transport>,
    address: Address,
    path: String,
    on_success: S,
    on_failure: F,
) where
    S: FnOnce(Vec<u8>) + Send + 'static,
    F: FnOnce(Error) + Send + 'static,
{
    sched.spawn(move || fetch(transport.as_ref(), &address, &path, on_success, on_failure));
}

/// Everything needed to issue fetches against one address: the address itself,
/// the transport attached to its scheme, and the scheduler to run them on.
#[derive(Clone)]
pub struct Endpoint {
    pub address: Address,
    pub transport: Arc<dyn Transport>,
    pub sched: Arc<Scheduler>,
}

impl Endpoint {
    #[inline]
    pub fn fetch_async<S, F>(&self, path: String, on_success: S, on_failure: F)
    where
        S: FnOnce(Vec<u8>) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        debug!("Fetching {}.", self.address.url(&path));
        fetch_async(
            &self.sched,
            self.transport.clone(),
            self.address.clone(),
            path,
            on_success,
            on_failure,
        );
    }
}

/// Central registry of the transports attached to each scheme.
#[derive(Default, Clone)]
pub struct SchemeResolver {
    transports: HashMap<Scheme, Arc<dyn Transport>>,
}

impl SchemeResolver {
    pub fn new() -> Self {
        SchemeResolver {
            transports: HashMap::new(),
        }
    }

    /// Attach or replace the transport of `scheme`.
    pub fn add<T: Transport>(&mut self, scheme: Scheme, transport: T) {
        self.transports.insert(scheme, Arc::new(transport));
    }

    #[inline]
    pub fn has(&self, scheme: Scheme) -> bool {
        self.transports.contains_key(&scheme)
    }

    /// Returns the transport attached to `scheme`.
    pub fn locate(&self, scheme: Scheme) -> Result<Arc<dyn Transport>> {
        self.transports
            .get(&scheme)
            .cloned()
            .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Echo;

    impl Transport for Echo {
        fn fetch(&self, _: &Address, path: &str) -> Result<Vec<u8>> {
            if path.starts_with("missing") {
                Err(Error::TransportFailure(path.to_owned()))
            } else {
                Ok(path.as_bytes().to_vec())
            }
        }
    }

    #[test]
    fn scheme() {
        assert_eq!("http".parse::<Scheme>().unwrap(), Scheme::Http);
        assert_eq!("HTTPS".parse::<Scheme>().unwrap(), Scheme::Https);
        assert_eq!("file".parse::<Scheme>().unwrap(), Scheme::File);
        assert!("ftp".parse::<Scheme>().is_err());
        assert_eq!(Scheme::Https.to_string(), "https");
    }

    #[test]
    fn url() {
        let address = Address::new(Scheme::Http, "127.0.0.1", 8081);
        assert_eq!(address.url("a.json"), "http://127.0.0.1:8081/a.json");
        assert_eq!(address.url("/a/b.json"), "http://127.0.0.1:8081/a/b.json");
        assert_eq!(address.to_string(), "http://127.0.0.1:8081");
    }

    #[test]
    fn fetch_invokes_exactly_one_continuation() {
        let address = Address::new(Scheme::Http, "localhost", 80);

        let hits = RefCell::new(Vec::new());
        let ok = |v: Vec<u8>| hits.borrow_mut().push(Ok(v));
        let err = |e: Error| hits.borrow_mut().push(Err(e));
        fetch(&Echo, &address, "a.txt", ok, err);
        fetch(&Echo, &address, "missing.txt", ok, err);

        let hits = hits.into_inner();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0], Ok(b"a.txt".to_vec()));
        assert_eq!(
            hits[1],
            Err(Error::TransportFailure("missing.txt".to_owned()))
        );
    }

    #[test]
    fn panicking_transport_fails() {
        struct Broken;

        impl Transport for Broken {
            fn fetch(&self, _: &Address, _: &str) -> Result<Vec<u8>> {
                panic!("socket exploded")
            }
        }

        let address = Address::new(Scheme::Http, "localhost", 80);
        let mut rsp = None;
        fetch(
            &Broken,
            &address,
            "a.txt",
            |_| panic!("unexpected success"),
            |err| rsp = Some(err),
        );

        match rsp {
            Some(Error::TransportFailure(msg)) => assert!(msg.contains("socket exploded")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fetch_async_runs_off_thread() {
        let sched = Scheduler::new(2, None, None).unwrap();
        let address = Address::new(Scheme::Http, "localhost", 80);
        let caller = std::thread::current().id();

        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        fetch_async(
            &sched,
            Arc::new(Echo),
            address,
            "b.txt".to_owned(),
            move |bytes| tx.send((std::thread::current().id(), Some(bytes))).unwrap(),
            move |_| tx2.send((std::thread::current().id(), None)).unwrap(),
        );

        let (id, bytes) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(id, caller);
        assert_eq!(bytes, Some(b"b.txt".to_vec()));
    }

    #[test]
    fn resolver() {
        let mut resolver = SchemeResolver::new();
        assert!(!resolver.has(Scheme::File));
        assert_eq!(
            resolver.locate(Scheme::File).err(),
            Some(Error::UnsupportedScheme("file".to_owned()))
        );

        resolver.add(Scheme::File, Echo);
        assert!(resolver.has(Scheme::File));
        assert!(resolver.locate(Scheme::File).is_ok());
    }
}
