use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::transport::{Address, Scheme};

/// A structure containing configuration data for the `ResourceManager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceParams {
    /// The scheme of the address all resources are fetched from.
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// The number of worker threads running fetches. Zero runs every fetch on the
    /// thread which requests it.
    pub workers: u32,
    /// Requests of the http transports fail after this many milliseconds.
    pub timeout_ms: u64,
    /// The directory resources are read from with the `file` scheme.
    pub root: PathBuf,
}

impl Default for ResourceParams {
    fn default() -> Self {
        ResourceParams {
            scheme: Scheme::Http,
            host: "127.0.0.1".to_owned(),
            port: 8081,
            workers: 4,
            timeout_ms: 30_000,
            root: PathBuf::from("."),
        }
    }
}

impl ResourceParams {
    /// Parses the params from a JSON document. Missing fields take their default values.
    pub fn from_json<T: AsRef<str>>(json: T) -> Result<Self> {
        let params: ResourceParams = serde_json::from_str(json.as_ref())?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme != Scheme::File && self.host.is_empty() {
            return Err(Error::Config(format!(
                "host of {} address could not be empty",
                self.scheme
            )));
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms could not be zero".to_owned()));
        }

        Ok(())
    }

    #[inline]
    pub fn address(&self) -> Address {
        Address::new(self.scheme, self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json() {
        let params =
            ResourceParams::from_json(r#"{"scheme": "https", "host": "example.com", "port": 443}"#)
                .unwrap();

        assert_eq!(params.scheme, Scheme::Https);
        assert_eq!(params.address().url("a.json"), "https://example.com:443/a.json");
        assert_eq!(params.workers, 4);
        assert_eq!(params.timeout_ms, 30_000);

        assert_eq!(ResourceParams::from_json("{}").unwrap(), ResourceParams::default());
    }

    #[test]
    fn malformed() {
        assert!(ResourceParams::from_json(r#"{"scheme": "ftp"}"#).is_err());
        assert!(ResourceParams::from_json(r#"{"host": ""}"#).is_err());
        assert!(ResourceParams::from_json(r#"{"timeout_ms": 0}"#).is_err());
        assert!(ResourceParams::from_json(r#"{"scheme": "file", "host": ""}"#).is_ok());
    }
}
