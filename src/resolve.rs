//! Typed access to the arguments a handler is invoked with.

use crate::{error::ArgError, path::Value, url_decoding::QueryMap};

/// A single bound argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A converted path variable
    Value(Value),
    /// Every query parameter of the request
    Query(QueryMap),
}

/// Arguments in the order the handler declared its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    args: Vec<(String, Arg)>,
}

impl Args {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, arg: Arg) {
        self.args.push((name.into(), arg));
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Fetch an argument by the name of its parameter.
    pub fn get<T>(&self, name: &str) -> Result<T, ArgError>
    where
        T: FromArg,
    {
        let (_, arg) = self
            .args
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?;

        T::from_arg(arg).ok_or_else(|| ArgError::WrongType {
            name: name.to_string(),
            expected: T::EXPECTED,
        })
    }

    /// Fetch an argument by its position
    pub fn at<T>(&self, index: usize) -> Result<T, ArgError>
    where
        T: FromArg,
    {
        let (name, arg) = self
            .args
            .get(index)
            .ok_or_else(|| ArgError::Missing(format!("#{index}")))?;

        T::from_arg(arg).ok_or_else(|| ArgError::WrongType {
            name: name.clone(),
            expected: T::EXPECTED,
        })
    }

    /// The query map of a handler declared with a query parameter
    pub fn query(&self) -> Option<&QueryMap> {
        self.args.iter().find_map(|(_, arg)| match arg {
            Arg::Query(q) => Some(q),
            Arg::Value(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.args.iter().map(|(n, a)| (n.as_str(), a))
    }
}

/// Types that can be extracted from an `Arg`. Each scalar type maps to exactly one variant of
/// `Value`; no implicit widening takes place.
pub trait FromArg: Sized {
    /// Name of the expected type, used in errors
    const EXPECTED: &'static str;

    fn from_arg(arg: &Arg) -> Option<Self>;
}

macro_rules! from_arg {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromArg for $ty {
                const EXPECTED: &'static str = $name;

                fn from_arg(arg: &Arg) -> Option<Self> {
                    match arg {
                        Arg::Value(Value::$variant(v)) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    }
}

from_arg! {
    String => String, "string";
    char => Char, "char";
    bool => Bool, "bool";
    u8 => Byte, "byte";
    i16 => Short, "short";
    i32 => Int, "int";
    i64 => Long, "long";
    f32 => Float, "float";
    f64 => Double, "double";
    u16 => UShort, "ushort";
    u32 => UInt, "uint";
    u64 => ULong, "ulong";
}

impl FromArg for Value {
    const EXPECTED: &'static str = "value";

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Value(v) => Some(v.clone()),
            Arg::Query(_) => None,
        }
    }
}

impl FromArg for QueryMap {
    const EXPECTED: &'static str = "query map";

    fn from_arg(arg: &Arg) -> Option<Self> {
        match arg {
            Arg::Query(q) => Some(q.clone()),
            Arg::Value(_) => None,
        }
    }
}
