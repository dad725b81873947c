//! Pluggable per-type decoders.

use std::marker::PhantomData;

/// Turns raw payloads into typed resource objects, and tears them down again.
///
/// This is the only point where the resource system is specialized per type;
/// registries stay agnostic of how the bytes are interpreted.
pub trait Loader: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// Decodes the payload of a fetch. Must not touch any shared state.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Item, failure::Error>;

    /// Releases anything `item` holds. Invoked only when the item is removed from its
    /// registry explicitly; objects replaced by a re-added one are merely dropped.
    fn release(&self, _: &Self::Item) -> Result<(), failure::Error> {
        Ok(())
    }
}

/// A `Loader` made of a decode closure and a release closure.
pub struct FnLoader<T, D, R> {
    decode: D,
    release: R,
    _phantom: PhantomData<fn() -> T>,
}

impl<T, D, R> FnLoader<T, D, R>
where
    T: Send + Sync + 'static,
    D: Fn(&[u8]) -> Result<T, failure::Error> + Send + Sync + 'static,
    R: Fn(&T) -> Result<(), failure::Error> + Send + Sync + 'static,
{
    pub fn new(decode: D, release: R) -> Self {
        FnLoader {
            decode,
            release,
            _phantom: PhantomData,
        }
    }
}

impl<T, D, R> Loader for FnLoader<T, D, R>
where
    T: Send + Sync + 'static,
    D: Fn(&[u8]) -> Result<T, failure::Error> + Send + Sync + 'static,
    R: Fn(&T) -> Result<(), failure::Error> + Send + Sync + 'static,
{
    type Item = T;

    #[inline]
    fn decode(&self, bytes: &[u8]) -> Result<T, failure::Error> {
        (self.decode)(bytes)
    }

    #[inline]
    fn release(&self, item: &T) -> Result<(), failure::Error> {
        (self.release)(item)
    }
}

/// Keeps the payload as it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesLoader;

impl Loader for BytesLoader {
    type Item = Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Item, failure::Error> {
        Ok(bytes.to_vec())
    }
}

/// Decodes the payload as UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl Loader for TextLoader {
    type Item = String;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Item, failure::Error> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Parses the payload into a JSON document.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLoader;

impl Loader for JsonLoader {
    type Item = serde_json::Value;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Item, failure::Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin() {
        assert_eq!(BytesLoader.decode(b"\x00\x01").unwrap(), vec![0, 1]);
        assert_eq!(TextLoader.decode(b"hello").unwrap(), "hello");
        assert!(TextLoader.decode(&[0xff, 0xfe]).is_err());

        let json = JsonLoader.decode(br#"{"id": 101000, "state": "ENABLED"}"#).unwrap();
        assert_eq!(json["id"], 101000);
        assert_eq!(json["state"], "ENABLED");
        assert!(JsonLoader.decode(b"{").is_err());
    }

    #[test]
    fn closures() {
        let loader = FnLoader::new(
            |bytes: &[u8]| Ok(bytes.len()),
            |len: &usize| {
                if *len == 0 {
                    Err(format_err!("nothing to release"))
                } else {
                    Ok(())
                }
            },
        );

        assert_eq!(loader.decode(b"abc").unwrap(), 3);
        assert!(loader.release(&3).is_ok());
        assert!(loader.release(&0).is_err());
    }
}
