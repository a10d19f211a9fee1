//! Extraction of cacheable payloads from call results

use crate::data::{ContentKind, FetchedResponse, Table};

/// Bytes to store for one call result, plus how they are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub kind: ContentKind,
}

impl Payload {
    pub fn new(bytes: Vec<u8>, kind: ContentKind) -> Self {
        Self { bytes, kind }
    }
}

/// A value that may be stored in the file cache
///
/// Values that have nothing to store keep the default implementation, which
/// returns `None`; the cache adapter then reports the value instead of
/// writing anything.
pub trait Cacheable: std::fmt::Debug {
    /// Extracts the bytes to write and their content kind
    fn cacheable_payload(&self) -> Option<Payload> {
        None
    }
}

impl Cacheable for FetchedResponse {
    fn cacheable_payload(&self) -> Option<Payload> {
        Some(Payload::new(self.body.clone(), ContentKind::Data))
    }
}

impl Cacheable for Table {
    fn cacheable_payload(&self) -> Option<Payload> {
        Some(Payload::new(self.to_csv().into_bytes(), ContentKind::Csv))
    }
}

impl Cacheable for str {
    fn cacheable_payload(&self) -> Option<Payload> {
        Some(Payload::new(self.as_bytes().to_vec(), ContentKind::Data))
    }
}

impl Cacheable for String {
    fn cacheable_payload(&self) -> Option<Payload> {
        self.as_str().cacheable_payload()
    }
}

impl<T: Cacheable + ?Sized> Cacheable for &T {
    fn cacheable_payload(&self) -> Option<Payload> {
        (**self).cacheable_payload()
    }
}

macro_rules! impl_not_cacheable {
    ($($ty:ty),* $(,)?) => {
        $(impl Cacheable for $ty {})*
    };
}

impl_not_cacheable!(
    (),
    bool,
    i32,
    i64,
    u32,
    u64,
    usize,
    f32,
    f64,
    serde_json::Value,
    Vec<u8>,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_payload_is_raw_body() {
        let response = FetchedResponse::from_cache("https://h.com", b"hello".to_vec());
        assert_eq!(
            response.cacheable_payload(),
            Some(Payload::new(b"hello".to_vec(), ContentKind::Data))
        );
    }

    #[test]
    fn test_table_payload_is_csv() {
        let table = Table::new(vec!["a".into()], vec![vec!["1".into()]]);
        let payload = table.cacheable_payload().expect("Table should be cacheable");

        assert_eq!(payload.kind, ContentKind::Csv);
        assert_eq!(payload.bytes, b"a\n1\n");
    }

    #[test]
    fn test_strings_are_utf8_data() {
        let payload = "héllo".cacheable_payload().unwrap();
        assert_eq!(payload.bytes, "héllo".as_bytes());
        assert_eq!(payload.kind, ContentKind::Data);
        assert_eq!(String::from("x").cacheable_payload().unwrap().bytes, b"x");
    }

    #[test]
    fn test_other_values_have_no_payload() {
        assert_eq!(42i64.cacheable_payload(), None);
        assert_eq!(true.cacheable_payload(), None);
        assert_eq!(json!({"a": 1}).cacheable_payload(), None);
        assert_eq!(().cacheable_payload(), None);
    }
}
