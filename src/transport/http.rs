use std::time::Duration;

use reqwest::blocking::Client;

use crate::errors::*;

use super::{Address, Scheme, Transport};

/// Fetches payloads with HTTP(S) `GET` requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Config(format!("could not build http client: {}", err)))?;

        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, address: &Address, path: &str) -> Result<Vec<u8>> {
        let url = address.url(path);
        if address.scheme == Scheme::File {
            return Err(Error::TransportFailure(format!("{} is not a http url", url)));
        }

        let failure = |err: reqwest::Error| Error::TransportFailure(format!("{} ({})", url, err));

        let rsp = self
            .client
            .get(&url)
            .send()
            .and_then(|rsp| rsp.error_for_status())
            .map_err(failure)?;

        let bytes = rsp.bytes().map_err(failure)?;
        Ok(bytes.to_vec())
    }
}
