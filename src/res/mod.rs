//! The resource system loads data asynchronously from a remote endpoint, and keeps the
//! decoded objects around until they are removed explicitly.
//!
//! # Loader
//!
//! Every resource type is registered with a `Loader`, a pair of functions which decode
//! the raw payload of a fetch into a typed object, and release that object once it is
//! removed. Built-in loaders cover plain bytes, UTF-8 text and JSON documents.
//!
//! # Registry
//!
//! Each registered type owns a `Registry`, which maps readable paths to the decoded
//! objects. A path is fetched at most once at any given time: requests which arrive
//! while a fetch is in flight are parked, and receive the outcome of that very fetch.
//! Identical paths of different types are independent entries.
//!
//! # Requests
//!
//! Results are delivered through a pair of continuations, exactly one of which is
//! invoked for every request. A request to an object which is stored already is
//! answered on the calling thread, everything else is answered from a worker thread of
//! the scheduler once the fetch resolves. `ResourceManager::load` wraps the
//! continuations into a pollable `Request`.
//!
//! ```no_run
//! use asset_fetch::prelude::*;
//!
//! let params = ResourceParams::default();
//! let res = ResourceManager::new(params).unwrap();
//! res.register(JsonLoader).unwrap();
//!
//! let req = res.load::<serde_json::Value>("v1/challenges.json", false).unwrap();
//! match req.wait() {
//!     Ok(json) => println!("{}", json),
//!     Err(err) => println!("{}", err),
//! }
//! ```

pub mod loader;
pub mod manager;
pub mod params;
pub mod registry;
pub mod request;

pub mod prelude {
    pub use super::loader::{BytesLoader, FnLoader, JsonLoader, Loader, TextLoader};
    pub use super::manager::ResourceManager;
    pub use super::params::ResourceParams;
    pub use super::registry::{Registry, ResourceState};
    pub use super::request::{Request, Response};
}
