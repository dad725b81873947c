/// Errors raised by the resource system.
///
/// `TransportFailure`, `DecodeFailure` and `Aborted` are only ever delivered through
/// the failure continuation of the affected request. The remaining variants are
/// contract violations returned synchronously to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum Error {
    #[fail(display = "Failed to fetch {}.", _0)]
    TransportFailure(String),
    #[fail(display = "Failed to decode {}.", _0)]
    DecodeFailure(String),
    #[fail(display = "Loader of type {} has been registered already.", _0)]
    DuplicateType(&'static str),
    #[fail(display = "Undefined loader for type {}.", _0)]
    UnknownType(&'static str),
    #[fail(display = "Resource {} could not be found.", _0)]
    NotFound(String),
    #[fail(display = "Resource {} is still being fetched.", _0)]
    Busy(String),
    #[fail(display = "Loading of {} has been aborted.", _0)]
    Aborted(String),
    #[fail(display = "The scheme {} has not been supported yet.", _0)]
    UnsupportedScheme(String),
    #[fail(display = "Malformed configuration: {}.", _0)]
    Config(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
