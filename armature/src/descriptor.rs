// Parameter descriptors: colon-separated paths with `*` wildcards
//
// descriptor := segment (":" segment)*
// segment    := name | "*"
// name       := [A-Za-z_][A-Za-z0-9_]*

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::component::Component;
use crate::parameter::ParameterBase;
use crate::{Error, Result};

/// Validate a component instance name or parameter name.
/// Names must start with a letter or underscore, followed by alphanumerics or underscores.
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return false,
    }
    bytes[1..].iter().all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Name(String),
    Wildcard,
}

impl Segment {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Name(n) => n == name,
            Self::Wildcard => true,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(n) => f.write_str(n),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// A parsed descriptor. The last segment addresses a parameter, the ones
/// before it address sub-components, starting from the component the
/// lookup is invoked on.
///
/// ```
/// use armature::descriptor::{Descriptor, Segment};
///
/// let d: Descriptor = "*:serial:baudrate".parse().unwrap();
/// assert_eq!(d.components().len(), 2);
/// assert_eq!(d.param(), &Segment::Name("baudrate".into()));
/// assert_eq!(d.to_string(), "*:serial:baudrate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    segments: Vec<Segment>,
}

impl Descriptor {
    pub fn parse(descriptor: &str) -> Result<Self> {
        // A leading ':' anchors to the invoking component, which is the default anyway
        let body = descriptor.strip_prefix(':').unwrap_or(descriptor);
        if body.is_empty() {
            return Err(Error::invalid_descriptor(descriptor, "empty descriptor"));
        }

        let segments = body
            .split(':')
            .map(|seg| match seg {
                "*" => Ok(Segment::Wildcard),
                "" => Err(Error::invalid_descriptor(descriptor, "empty segment")),
                name if is_valid_name(name) => Ok(Segment::Name(name.to_string())),
                name => Err(Error::invalid_descriptor(
                    descriptor,
                    format!("invalid segment '{name}'"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments naming sub-components.
    pub fn components(&self) -> &[Segment] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Segment naming the parameter.
    pub fn param(&self) -> &Segment {
        // parse() never yields an empty segment list
        &self.segments[self.segments.len() - 1]
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }
}

impl FromStr for Descriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

/// Per-match action: receives the parameter and its resolved descriptor.
pub type ParamAction<'a> = dyn FnMut(&Arc<dyn ParameterBase>, &str) -> Result<()> + 'a;

/// Depth-first walk over every parameter matching `segments` under `comp`.
///
/// Children are visited in insertion order. `done` is checked after each
/// match; returning true stops the walk. Returns whether the walk stopped
/// early.
pub(crate) fn visit<C: Component + ?Sized>(
    comp: &C,
    segments: &[Segment],
    prefix: &str,
    act: &mut ParamAction<'_>,
    done: &mut dyn FnMut() -> bool,
) -> Result<bool> {
    let core = comp.core();

    if let [param] = segments {
        for p in core.params().all() {
            if param.matches(p.name()) {
                act(&p, &format!("{prefix}{}", p.name()))?;
                if done() {
                    return Ok(true);
                }
            }
        }
        return Ok(false);
    }

    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Ok(false),
    };

    for sub in core.sub_components() {
        let name = sub.core().instance_name();
        if head.matches(name) && visit(&*sub, rest, &format!("{prefix}{name}:"), act, done)? {
            return Ok(true);
        }
    }
    Ok(false)
}
