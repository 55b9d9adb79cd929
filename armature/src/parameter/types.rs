//! Declaration-side parameter types.

use std::fmt;

use regex::Regex;

use super::value::ParamValue;
use crate::{Error, Result};

/// Constraint on the values a parameter may take.
pub enum ValidValues<T> {
    None,
    /// Discrete set of allowed values.
    List(Vec<T>),
    /// Inclusive range.
    Range(ValueRange<T>),
    /// Pattern the string form of the value must match.
    Regex(Regex),
}

/// Inclusive `[min, max]` range over any ordered parameter type.
pub struct ValueRange<T> {
    min: T,
    max: T,
    contains: fn(&T, &T, &T) -> bool,
}

fn in_range<T: PartialOrd>(value: &T, min: &T, max: &T) -> bool {
    min <= value && value <= max
}

impl<T: PartialOrd> ValueRange<T> {
    pub fn new(min: T, max: T) -> Self {
        Self {
            min,
            max,
            contains: in_range::<T>,
        }
    }
}

impl<T> ValueRange<T> {
    pub fn min(&self) -> &T {
        &self.min
    }

    pub fn max(&self) -> &T {
        &self.max
    }

    pub fn contains(&self, value: &T) -> bool {
        (self.contains)(value, &self.min, &self.max)
    }
}

impl<T: ParamValue> ValidValues<T> {
    /// Check a candidate value, returning the reason on rejection.
    pub fn check(&self, value: &T) -> std::result::Result<(), String> {
        match self {
            Self::None => Ok(()),
            Self::List(list) if list.contains(value) => Ok(()),
            Self::Range(range) if range.contains(value) => Ok(()),
            Self::Regex(re) if re.is_match(&value.to_param_string()) => Ok(()),
            _ => Err(format!(
                "value [{}] not in {}",
                value.to_param_string(),
                self.describe()
            )),
        }
    }

    /// Textual form of the constraint, e.g. `List:[LF|CR|CRLF]`.
    pub fn describe(&self) -> String {
        match self {
            Self::None => "None:[]".to_string(),
            Self::List(list) => format!(
                "List:[{}]",
                list.iter()
                    .map(ParamValue::to_param_string)
                    .collect::<Vec<_>>()
                    .join("|")
            ),
            Self::Range(range) => format!(
                "Range:[{}-{}]",
                range.min.to_param_string(),
                range.max.to_param_string()
            ),
            Self::Regex(re) => format!("Regex:[{}]", re.as_str()),
        }
    }
}

impl<T: ParamValue> fmt::Debug for ValidValues<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Compile-time-like declaration of a parameter: name, value type, default,
/// description, constraint and category.
///
/// ```
/// use armature::parameter::ParameterDef;
///
/// let def = ParameterDef::new("fps", "Frames per second", 30u32, "Camera")
///     .with_range(1, 120);
/// assert_eq!(def.name, "fps");
/// ```
pub struct ParameterDef<T> {
    pub name: String,
    pub description: String,
    pub default: T,
    pub category: String,
    pub(crate) valid: ValidSpec<T>,
}

pub(crate) enum ValidSpec<T> {
    None,
    List(Vec<T>),
    Range(ValueRange<T>),
    Regex(String),
}

impl<T: ParamValue> ParameterDef<T> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default: T,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default,
            category: category.into(),
            valid: ValidSpec::None,
        }
    }

    pub fn with_valid_values<I: IntoIterator<Item = T>>(mut self, values: I) -> Self {
        self.valid = ValidSpec::List(values.into_iter().collect());
        self
    }

    pub fn with_range(mut self, min: T, max: T) -> Self
    where
        T: PartialOrd,
    {
        self.valid = ValidSpec::Range(ValueRange::new(min, max));
        self
    }

    /// The pattern is compiled when the parameter is declared.
    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.valid = ValidSpec::Regex(pattern.into());
        self
    }

    pub(crate) fn compile_valid(&mut self) -> Result<ValidValues<T>> {
        Ok(match std::mem::replace(&mut self.valid, ValidSpec::None) {
            ValidSpec::None => ValidValues::None,
            ValidSpec::List(list) => ValidValues::List(list),
            ValidSpec::Range(range) => ValidValues::Range(range),
            ValidSpec::Regex(pattern) => ValidValues::Regex(
                Regex::new(&pattern)
                    .map_err(|e| Error::validation(&self.name, format!("bad regex: {e}")))?,
            ),
        })
    }
}

/// Flattened, string-valued description of a parameter, as produced by
/// [`ComponentExt::param_summaries`](crate::component::ComponentExt::param_summaries).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParameterSummary {
    pub descriptor: String,
    pub name: String,
    pub description: String,
    pub value_type: String,
    pub default_value: String,
    pub value: String,
    pub valid_values: String,
    pub category: String,
    pub frozen: bool,
}
