use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use crate::errors::*;

use super::{Address, Transport};

/// Reads payloads from a directory on the local host filesystem. Host and port of
/// the address are ignored.
#[derive(Debug, Clone)]
pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new<T: Into<PathBuf>>(root: T) -> Self {
        FileTransport { root: root.into() }
    }

    fn load_from(&self, path: &str) -> Result<Vec<u8>> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|v| !matches!(v, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::TransportFailure(format!(
                "{} escapes the root directory",
                path
            )));
        }

        let location = self.root.join(relative);
        let failure = |err: std::io::Error| {
            Error::TransportFailure(format!("{} ({})", location.display(), err))
        };

        let mut file = fs::File::open(&location).map_err(failure)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(failure)?;
        Ok(buf)
    }
}

impl Transport for FileTransport {
    #[inline]
    fn fetch(&self, _: &Address, path: &str) -> Result<Vec<u8>> {
        self.load_from(path)
    }
}
