//! An asynchronous loading request.

use std::sync::Arc;

use crate::errors::*;
use crate::sched::prelude::{Latch, LockLatch};

/// The outcome of a request: a shared handle to the decoded object, or the reason
/// why it could not be produced.
pub type Response<T> = Result<Arc<T>>;

/// An asynchronous loading request. You should check the completion status with
/// the `poll` method manually, or block on it with `wait`. Once the polling returns
/// true, you could fetch the result by `response`.
pub enum Request<T> {
    NotReady(Arc<LockLatch<Response<T>>>),
    Ok(Response<T>),
}

impl<T> Request<T> {
    #[inline]
    pub fn latch() -> Arc<LockLatch<Response<T>>> {
        Arc::new(LockLatch::new())
    }

    #[inline]
    pub fn new(latch: Arc<LockLatch<Response<T>>>) -> Self {
        Request::NotReady(latch)
    }

    /// Attempt to resolve the request to a final state, and returns true if the
    /// loading result is ready for user.
    pub fn poll(&mut self) -> bool {
        let rsp = match *self {
            Request::Ok(_) => return true,
            Request::NotReady(ref state) => {
                if !state.is_set() {
                    return false;
                }

                match state.take() {
                    Some(rsp) => rsp,
                    None => return false,
                }
            }
        };

        *self = Request::Ok(rsp);
        true
    }

    /// Blocks current thread until the request is resolved, and returns the response.
    pub fn wait(mut self) -> Response<T> {
        if let Request::NotReady(ref state) = self {
            state.wait();
        }

        self.poll();
        match self {
            Request::Ok(rsp) => rsp,
            Request::NotReady(_) => unreachable!("latch is set once waited"),
        }
    }

    /// Return the response if exists.
    #[inline]
    pub fn response(&self) -> Option<&Response<T>> {
        if let Request::Ok(ref rsp) = *self {
            Some(rsp)
        } else {
            None
        }
    }
}
