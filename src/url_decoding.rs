//! Query string decoding.

/// Decoded query parameters. Lookups compare keys case insensitively; the first occurrence of a
/// key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap {
    pairs: Vec<(String, String)>,
}

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in the order they appeared in the query string
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = QueryMap::new();

        for (k, v) in iter {
            map.insert(k, v);
        }

        map
    }
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let high = (high as char).to_digit(16)?;
    let low = (low as char).to_digit(16)?;

    Some((high * 16 + low) as u8)
}

fn decode_component(encoded: &str) -> Option<String> {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut bytes = encoded.bytes();

    while let Some(byte) = bytes.next() {
        match byte {
            b'%' => decoded.push(hex_pair(bytes.next()?, bytes.next()?)?),

            b'+' => decoded.push(b' '),

            byte => decoded.push(byte),
        }
    }

    String::from_utf8(decoded).ok()
}

/// Percent decode a request path. `+` is kept as is, and an encoded `/` stays encoded so it
/// can never introduce a segment boundary. Returns `None` on malformed encoding or invalid
/// UTF-8.
pub fn decode_path(encoded: &str) -> Option<String> {
    let mut decoded = Vec::with_capacity(encoded.len());
    let mut bytes = encoded.bytes();

    while let Some(byte) = bytes.next() {
        if byte != b'%' {
            decoded.push(byte);
            continue;
        }

        let (high, low) = (bytes.next()?, bytes.next()?);

        match hex_pair(high, low)? {
            b'/' => decoded.extend_from_slice(&[b'%', high, low]),
            byte => decoded.push(byte),
        }
    }

    String::from_utf8(decoded).ok()
}

/// Parse a raw query string, without the leading `?`. A key without `=` maps to an empty value.
/// Returns `None` on malformed percent encoding.
pub fn map(encoded: &str) -> Option<QueryMap> {
    let mut map = QueryMap::new();

    for pair in encoded.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));

        map.insert(decode_component(key)?, decode_component(value)?);
    }

    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pairs() {
        let query = map("count=5&name=hello+world&sym=%26%3D").unwrap();

        assert_eq!(query.len(), 3);
        assert_eq!(query.get("count"), Some("5"));
        assert_eq!(query.get("name"), Some("hello world"));
        assert_eq!(query.get("sym"), Some("&="));
    }

    #[test]
    fn keys_are_case_insensitive() {
        let query = map("Count=5&count=6").unwrap();

        assert_eq!(query.get("COUNT"), Some("5"));
        assert!(query.contains_key("count"));
    }

    #[test]
    fn flags_and_empty_pairs() {
        let query = map("&flag&x=").unwrap();

        assert_eq!(query.get("flag"), Some(""));
        assert_eq!(query.get("x"), Some(""));
        assert_eq!(query.len(), 2);
    }

    #[test]
    fn malformed_encoding() {
        assert!(map("a=%2").is_none());
        assert!(map("a=%zz").is_none());
        assert!(map("a=%ff").is_none());
    }

    #[test]
    fn paths() {
        assert_eq!(decode_path("/argtest/5/John%20Doe").as_deref(), Some("/argtest/5/John Doe"));
        assert_eq!(decode_path("/a+b/caf%c3%a9").as_deref(), Some("/a+b/café"));
        assert_eq!(decode_path("/a%2Fb%2fc").as_deref(), Some("/a%2Fb%2fc"));
        assert_eq!(decode_path("/%ff"), None);
        assert_eq!(decode_path("/%4"), None);
    }

    #[test]
    fn utf8_sequences() {
        let query = map("q=caf%C3%A9").unwrap();

        assert_eq!(query.get("q"), Some("café"));
    }
}
