pub use crate::errors::{Error, Result};
pub use crate::res::prelude::*;
pub use crate::transport::{Address, FileTransport, HttpTransport, Scheme, Transport};
