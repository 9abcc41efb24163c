//! Route templates and the typed values captured from them.
//!
//! A template is literal text with `{name}` or `{name:type}` captures, for example
//! `/users/{id:uint}/posts/{slug}`. A capture always spans one whole path segment and
//! consumes everything up to the next `/`.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

use crate::{error::PatternError, method::MethodSet};

/// The closed set of types a path variable or handler parameter may be declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Char,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    UShort,
    UInt,
    ULong,
}

impl ScalarType {
    pub const ALL: [ScalarType; 12] = [
        ScalarType::String,
        ScalarType::Char,
        ScalarType::Bool,
        ScalarType::Byte,
        ScalarType::Short,
        ScalarType::Int,
        ScalarType::Long,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::UShort,
        ScalarType::UInt,
        ScalarType::ULong,
    ];

    /// The name used in templates
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Char => "char",
            ScalarType::Bool => "bool",
            ScalarType::Byte => "byte",
            ScalarType::Short => "short",
            ScalarType::Int => "int",
            ScalarType::Long => "long",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::UShort => "ushort",
            ScalarType::UInt => "uint",
            ScalarType::ULong => "ulong",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a type name is not one of the supported scalar types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownType(pub String);

impl FromStr for ScalarType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarType::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownType(s.to_string()))
    }
}

/// A converted path variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Char(char),
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    UShort(u16),
    UInt(u32),
    ULong(u64),
}

impl Value {
    /// Convert raw path text into a value of type `ty`. Returns `None` unless the whole input is
    /// a valid representation of the type.
    pub fn parse(ty: ScalarType, raw: &str) -> Option<Value> {
        let value = match ty {
            ScalarType::String => Value::String(raw.to_string()),
            ScalarType::Char => {
                let mut chars = raw.chars();

                let c = chars.next()?;

                if chars.next().is_some() {
                    return None;
                }

                Value::Char(c)
            }
            ScalarType::Bool => Value::Bool(parse_bool(raw)?),
            ScalarType::Byte => Value::Byte(integer(raw)?),
            ScalarType::Short => Value::Short(integer(raw)?),
            ScalarType::Int => Value::Int(integer(raw)?),
            ScalarType::Long => Value::Long(integer(raw)?),
            ScalarType::Float => Value::Float(float(raw).filter(|f: &f32| f.is_finite())?),
            ScalarType::Double => Value::Double(float(raw).filter(|f: &f64| f.is_finite())?),
            ScalarType::UShort => Value::UShort(integer(raw)?),
            ScalarType::UInt => Value::UInt(integer(raw)?),
            ScalarType::ULong => Value::ULong(integer(raw)?),
        };

        Some(value)
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::String(_) => ScalarType::String,
            Value::Char(_) => ScalarType::Char,
            Value::Bool(_) => ScalarType::Bool,
            Value::Byte(_) => ScalarType::Byte,
            Value::Short(_) => ScalarType::Short,
            Value::Int(_) => ScalarType::Int,
            Value::Long(_) => ScalarType::Long,
            Value::Float(_) => ScalarType::Float,
            Value::Double(_) => ScalarType::Double,
            Value::UShort(_) => ScalarType::UShort,
            Value::UInt(_) => ScalarType::UInt,
            Value::ULong(_) => ScalarType::ULong,
        }
    }
}

/// Digits with an optional leading `-`. No `+` and no leading zeros other than `0` itself.
fn canonical_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);

    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

fn integer<N: FromStr>(raw: &str) -> Option<N> {
    canonical_integer(raw).then(|| raw.parse().ok()).flatten()
}

/// A canonical integer part, an optional fraction with at least one digit and an optional
/// exponent.
fn float<N: FromStr>(raw: &str) -> Option<N> {
    let (mantissa, exponent) = match raw.find(['e', 'E']) {
        Some(i) => (&raw[..i], Some(&raw[i + 1..])),
        None => (raw, None),
    };

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };

    let exponent_ok = exponent.map_or(true, |e| {
        let digits = e.strip_prefix(['-', '+']).unwrap_or(e);

        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    });

    let fraction_ok =
        fraction.map_or(true, |f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()));

    (canonical_integer(whole) && fraction_ok && exponent_ok)
        .then(|| raw.parse().ok())
        .flatten()
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Variables captured by a successful match, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(HashMap<String, Value>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.0.insert(name, value);
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }
}

/// One piece of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matched by an exact, case sensitive run of characters
    Literal(String),
    /// Matched by everything up to the next `/` that converts to `ty`
    Variable { name: String, ty: ScalarType },
}

/// A compiled route template together with the methods it answers to.
///
/// Two patterns are equal when their method sets and segments are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<Segment>,
    methods: MethodSet,
}

impl PathPattern {
    /// Compile a template answering to `GET`
    pub fn new(template: &str) -> Result<Self, PatternError> {
        Self::compile(template, MethodSet::GET)
    }

    pub fn compile(template: &str, methods: MethodSet) -> Result<Self, PatternError> {
        Ok(Self {
            segments: parse_segments(template)?,
            methods,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn methods(&self) -> MethodSet {
        self.methods
    }

    pub fn enabled_for(&self, method: &http::Method) -> bool {
        self.methods.contains(method)
    }

    /// Variables in declaration order
    pub fn variables(&self) -> impl Iterator<Item = (&str, ScalarType)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable { name, ty } => Some((name.as_str(), *ty)),
            Segment::Literal(_) => None,
        })
    }

    pub fn variable_types(&self) -> HashMap<&str, ScalarType> {
        self.variables().collect()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.bind(path).is_some()
    }

    /// Match `path` against the pattern, returning the converted variables on success.
    pub fn bind(&self, path: &str) -> Option<Bindings> {
        let mut bindings = Bindings::new();
        let mut rest = path;

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    rest = rest.strip_prefix(text.as_str())?;
                }
                Segment::Variable { name, ty } => {
                    let end = rest.find('/').unwrap_or(rest.len());

                    let (raw, remaining) = rest.split_at(end);

                    bindings.insert(name.clone(), Value::parse(*ty, raw)?);

                    rest = remaining;
                }
            }
        }

        rest.is_empty().then_some(bindings)
    }
}

fn parse_segments(template: &str) -> Result<Vec<Segment>, PatternError> {
    if template.is_empty() {
        return Ok(vec![Segment::Literal("/".to_string())]);
    }

    let mut segments = Vec::new();
    let mut seen = HashSet::new();
    let mut buf = String::new();
    let mut in_variable = false;
    let mut starts_segment = true;

    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_variable {
            match c {
                '{' => {
                    starts_segment = buf.is_empty() && segments.is_empty() || buf.ends_with('/');

                    if !buf.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut buf)));
                    }

                    in_variable = true;
                }
                '}' => {
                    return Err(PatternError::MismatchedClosingBrace {
                        template: template.to_string(),
                    })
                }
                c => buf.push(c),
            }

            continue;
        }

        match c {
            '{' => {
                return Err(PatternError::NestedVariable {
                    template: template.to_string(),
                })
            }
            '}' => {
                let (name, ty) = parse_variable(template, &buf)?;

                buf.clear();
                in_variable = false;

                if !starts_segment || !matches!(chars.peek(), None | Some('/')) {
                    return Err(PatternError::PartialSegment {
                        template: template.to_string(),
                        name,
                    });
                }

                if !seen.insert(name.clone()) {
                    return Err(PatternError::DuplicateVariable {
                        template: template.to_string(),
                        name,
                    });
                }

                segments.push(Segment::Variable { name, ty });
            }
            c => buf.push(c),
        }
    }

    if in_variable {
        return Err(PatternError::UnterminatedVariable {
            template: template.to_string(),
        });
    }

    if !buf.is_empty() {
        segments.push(Segment::Literal(buf));
    }

    Ok(segments)
}

fn parse_variable(template: &str, declaration: &str) -> Result<(String, ScalarType), PatternError> {
    let parts: Vec<&str> = declaration.split(':').collect();

    if parts.len() > 2 {
        return Err(PatternError::TooManyColons {
            template: template.to_string(),
            declaration: declaration.to_string(),
        });
    }

    let name = parts[0];

    if name.is_empty() {
        return Err(PatternError::EmptyVariableName {
            template: template.to_string(),
        });
    }

    let ty = match parts.get(1) {
        Some(type_name) => {
            type_name
                .parse()
                .map_err(|UnknownType(type_name)| PatternError::UnsupportedType {
                    template: template.to_string(),
                    type_name,
                })?
        }
        None => ScalarType::String,
    };

    Ok((name.to_string(), ty))
}
