//! Sets of http methods a route answers to.

use http::Method;

/// A bit set over the methods a route can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodSet(u8);

impl MethodSet {
    pub const GET: MethodSet = MethodSet(1);
    pub const POST: MethodSet = MethodSet(1 << 1);
    pub const PUT: MethodSet = MethodSet(1 << 2);
    pub const PATCH: MethodSet = MethodSet(1 << 3);
    pub const DELETE: MethodSet = MethodSet(1 << 4);

    /// An empty set. Matches nothing.
    pub const fn empty() -> Self {
        MethodSet(0)
    }

    pub const fn union(self, other: MethodSet) -> Self {
        MethodSet(self.0 | other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse a single case insensitive method token such as `"get"` or `"Delete"`
    pub fn from_token(token: &str) -> Option<Self> {
        let set = match token.to_ascii_lowercase().as_str() {
            "get" => MethodSet::GET,
            "post" => MethodSet::POST,
            "put" => MethodSet::PUT,
            "patch" => MethodSet::PATCH,
            "delete" => MethodSet::DELETE,
            _ => return None,
        };

        Some(set)
    }

    /// Parse a list of tokens. An empty list yields `GET`. On failure the offending token is
    /// returned.
    pub fn from_tokens<'a, I>(tokens: I) -> Result<Self, &'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = MethodSet::empty();

        for token in tokens {
            set = set.union(MethodSet::from_token(token).ok_or(token)?);
        }

        if set.is_empty() {
            return Ok(MethodSet::GET);
        }

        Ok(set)
    }

    /// Maps an `http::Method` onto the set. Methods outside the supported five map to an empty
    /// set.
    pub fn of(method: &Method) -> Self {
        match *method {
            Method::GET => MethodSet::GET,
            Method::POST => MethodSet::POST,
            Method::PUT => MethodSet::PUT,
            Method::PATCH => MethodSet::PATCH,
            Method::DELETE => MethodSet::DELETE,
            _ => MethodSet::empty(),
        }
    }

    pub fn contains(&self, method: &Method) -> bool {
        let other = MethodSet::of(method);

        !other.is_empty() && self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for MethodSet {
    type Output = MethodSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_case_insensitive() {
        let set = MethodSet::from_tokens(["GET", "post", "Delete"]).unwrap();

        assert!(set.contains(&Method::GET));
        assert!(set.contains(&Method::POST));
        assert!(set.contains(&Method::DELETE));
        assert!(!set.contains(&Method::PUT));
        assert!(!set.contains(&Method::PATCH));
    }

    #[test]
    fn empty_list_defaults_to_get() {
        assert_eq!(MethodSet::from_tokens(std::iter::empty()), Ok(MethodSet::GET));
    }

    #[test]
    fn unknown_token_is_returned() {
        assert_eq!(MethodSet::from_tokens(["get", "stuff"]), Err("stuff"));
    }

    #[test]
    fn unsupported_methods_never_match() {
        let set = MethodSet::GET | MethodSet::POST | MethodSet::PUT;

        assert!(!set.contains(&Method::HEAD));
        assert!(!set.contains(&Method::OPTIONS));
    }
}
