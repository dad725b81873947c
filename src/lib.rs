//! # What is This?
//!
//! A deduplicated asynchronous resource loader with pluggable typed decoders.
//!
//! Resources are identified by readable paths relative to a configured address. The
//! first request of a path fetches its raw bytes on a worker thread, decodes them with
//! the loader registered for the requested type, and hands the decoded object to every
//! caller which asked for that path in the meantime. Later requests are answered from
//! the registry directly, until the object is removed.
//!
//! The crate consists of three layers:
//!
//! 1. `transport`, single-shot fetches of opaque payloads over http, https or the local
//! filesystem, in a blocking and a non-blocking flavor.
//! 2. `res::registry`, the per-type bookkeeping of fetches in flight and decoded objects.
//! 3. `res::manager`, the entry point which owns the registries, the address and the
//! worker threads.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

pub extern crate serde_json;

pub mod errors;
pub mod res;
pub mod sched;
pub mod transport;

pub mod prelude;
