//! String marshalling for parameter values.
//!
//! Every type that can live in a [`Parameter`](super::Parameter) implements
//! [`ParamValue`], which guarantees `from_string(to_string(v)) == v`.

use std::fmt::Debug;

use crate::util::parse_integer;
use crate::{Error, Result};

/// A value type that can be stored in a parameter.
pub trait ParamValue: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn to_param_string(&self) -> String;
    fn from_param_string(s: &str) -> Result<Self>;
}

/// Convert a string into a parameter value.
pub fn from_string<T: ParamValue>(s: &str) -> Result<T> {
    T::from_param_string(s)
}

/// Convert a parameter value into its string form.
pub fn to_string<T: ParamValue>(value: &T) -> String {
    value.to_param_string()
}

macro_rules! impl_param_int {
    ($($t:ty),*) => {$(
        impl ParamValue for $t {
            fn to_param_string(&self) -> String {
                self.to_string()
            }

            fn from_param_string(s: &str) -> Result<Self> {
                let wide = parse_integer(s)?;
                <$t>::try_from(wide).map_err(|_| {
                    Error::validation(
                        "",
                        format!("{} is out of range for {}", wide, stringify!($t)),
                    )
                })
            }
        }
    )*};
}

impl_param_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_param_float {
    ($($t:ty),*) => {$(
        impl ParamValue for $t {
            fn to_param_string(&self) -> String {
                self.to_string()
            }

            fn from_param_string(s: &str) -> Result<Self> {
                s.trim().parse::<$t>().map_err(|e| {
                    Error::validation("", format!("cannot parse [{}] as {}: {}", s, stringify!($t), e))
                })
            }
        }
    )*};
}

impl_param_float!(f32, f64);

impl ParamValue for bool {
    fn to_param_string(&self) -> String {
        self.to_string()
    }

    fn from_param_string(s: &str) -> Result<Self> {
        match s.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(Error::validation(
                "",
                format!("cannot parse [{other}] as bool, expected true|false|1|0"),
            )),
        }
    }
}

impl ParamValue for String {
    fn to_param_string(&self) -> String {
        self.clone()
    }

    fn from_param_string(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }
}

impl ParamValue for char {
    fn to_param_string(&self) -> String {
        self.to_string()
    }

    fn from_param_string(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::validation("", format!("[{s}] is not a single character"))),
        }
    }
}

/// Implement [`ParamValue`] for a fieldless enum deriving strum's
/// `Display`, `EnumString` and `VariantNames`.
///
/// ```
/// #[derive(Debug, Clone, Copy, PartialEq, strum::Display, strum::EnumString, strum::VariantNames)]
/// enum Speed {
///     Slow,
///     Fast,
/// }
/// armature::param_enum!(Speed);
///
/// use armature::parameter::from_string;
/// assert_eq!(from_string::<Speed>("Fast").unwrap(), Speed::Fast);
/// assert!(from_string::<Speed>("Medium").is_err());
/// ```
#[macro_export]
macro_rules! param_enum {
    ($t:ty) => {
        impl $crate::parameter::ParamValue for $t {
            fn to_param_string(&self) -> String {
                self.to_string()
            }

            fn from_param_string(s: &str) -> $crate::Result<Self> {
                <$t as ::std::str::FromStr>::from_str(s.trim()).map_err(|_| {
                    $crate::Error::validation(
                        "",
                        format!(
                            "[{}] is not one of [{}]",
                            s,
                            <$t as ::strum::VariantNames>::VARIANTS.join("|")
                        ),
                    )
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: ParamValue>(value: T) {
        let s = to_string(&value);
        assert_eq!(from_string::<T>(&s).unwrap(), value, "round trip of [{s}]");
    }

    #[test]
    fn test_scalar_round_trip() {
        round_trip(i8::MIN);
        round_trip(i64::MAX);
        round_trip(u64::MAX);
        round_trip(0usize);
        round_trip(-1234i32);
        round_trip(0.1f64);
        round_trip(-3.25e-12f64);
        round_trip(f32::MAX);
        round_trip(true);
        round_trip(false);
        round_trip('x');
        round_trip(String::from("hello world"));
        round_trip(String::new());
    }

    #[test]
    fn test_integer_prefixes() {
        assert_eq!(from_string::<u32>("0x10").unwrap(), 16);
        assert_eq!(from_string::<u32>("010").unwrap(), 8);
        assert_eq!(from_string::<i32>("-0x10").unwrap(), -16);
    }

    #[test]
    fn test_integer_out_of_range() {
        assert!(matches!(
            from_string::<u8>("256"),
            Err(Error::Validation { .. })
        ));
        assert!(from_string::<u32>("-1").is_err());
        assert_eq!(from_string::<i8>("-128").unwrap(), -128);
    }

    #[test]
    fn test_bool_forms() {
        assert!(from_string::<bool>("1").unwrap());
        assert!(!from_string::<bool>("0").unwrap());
        assert!(from_string::<bool>("yes").is_err());
    }

    #[test]
    fn test_float_garbage() {
        assert!(from_string::<f64>("fast").is_err());
        assert_eq!(from_string::<f64>(" 2.5 ").unwrap(), 2.5);
    }
}
