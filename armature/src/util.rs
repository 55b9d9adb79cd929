//! Small helpers shared by the parameter and component layers.

use crate::{Error, Result};

/// Human-readable name of a type, used for default instance names and error
/// messages.
pub fn demangled_name<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}

/// Strip module path and generic arguments from a type name.
///
/// ```
/// use armature::util::short_type_name;
///
/// assert_eq!(short_type_name("my_app::camera::Camera"), "Camera");
/// assert_eq!(short_type_name("my_app::Wrapper<my_app::Inner>"), "Wrapper");
/// ```
pub fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Parse an integer the way C's `strtoll(.., 0)` does: optional sign, `0x`
/// prefix for hex, leading `0` for octal, decimal otherwise.
pub fn parse_integer(s: &str) -> Result<i128> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    // from_str_radix would accept a second sign after the prefix
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::validation("", format!("cannot parse [{s}] as an integer")));
    }

    let magnitude = i128::from_str_radix(body, radix)
        .map_err(|e| Error::validation("", format!("cannot parse [{s}] as an integer: {e}")))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Intermediate representation used by [`clamped_convert`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wide {
    Int(i128),
    Float(f64),
}

/// Numeric types that take part in [`clamped_convert`].
pub trait Clamped: Copy {
    fn widen(self) -> Wide;
    fn narrow(wide: Wide) -> Self;
}

macro_rules! impl_clamped_int {
    ($($t:ty),*) => {$(
        impl Clamped for $t {
            fn widen(self) -> Wide {
                Wide::Int(self as i128)
            }

            fn narrow(wide: Wide) -> Self {
                match wide {
                    Wide::Int(v) => v.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t,
                    // float -> int casts saturate and map NaN to zero
                    Wide::Float(v) => v as $t,
                }
            }
        }
    )*};
}

impl_clamped_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Clamped for f32 {
    fn widen(self) -> Wide {
        Wide::Float(self as f64)
    }

    fn narrow(wide: Wide) -> Self {
        match wide {
            Wide::Int(v) => v as f32,
            Wide::Float(v) if v.is_nan() => f32::NAN,
            Wide::Float(v) => v.clamp(f32::MIN as f64, f32::MAX as f64) as f32,
        }
    }
}

impl Clamped for f64 {
    fn widen(self) -> Wide {
        Wide::Float(self)
    }

    fn narrow(wide: Wide) -> Self {
        match wide {
            Wide::Int(v) => v as f64,
            Wide::Float(v) => v,
        }
    }
}

/// Numeric conversion that saturates at the destination bounds instead of
/// wrapping.
///
/// ```
/// use armature::util::clamped_convert;
///
/// assert_eq!(clamped_convert::<u8, i32>(300), 255);
/// assert_eq!(clamped_convert::<u8, i32>(-4), 0);
/// assert_eq!(clamped_convert::<i16, f64>(1.0e9), i16::MAX);
/// ```
pub fn clamped_convert<D: Clamped, S: Clamped>(source: S) -> D {
    D::narrow(source.widen())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_integer_radix() {
        assert_eq!(parse_integer("42").unwrap(), 42);
        assert_eq!(parse_integer("-42").unwrap(), -42);
        assert_eq!(parse_integer("+7").unwrap(), 7);
        assert_eq!(parse_integer("0x1F").unwrap(), 31);
        assert_eq!(parse_integer("0X1f").unwrap(), 31);
        assert_eq!(parse_integer("017").unwrap(), 15);
        assert_eq!(parse_integer("0").unwrap(), 0);
        assert_eq!(parse_integer("  12  ").unwrap(), 12);
    }

    #[test]
    fn test_parse_integer_rejects_garbage() {
        assert!(parse_integer("").is_err());
        assert!(parse_integer("0x").is_err());
        assert!(parse_integer("12a").is_err());
        assert!(parse_integer("09").is_err());
        assert!(parse_integer("--1").is_err());
        assert!(parse_integer("0x-1").is_err());
        assert!(parse_integer("fast").is_err());
    }

    #[test]
    fn test_clamped_convert_ints() {
        assert_eq!(clamped_convert::<i8, i64>(1000), i8::MAX);
        assert_eq!(clamped_convert::<i8, i64>(-1000), i8::MIN);
        assert_eq!(clamped_convert::<u32, i64>(-1), 0);
        assert_eq!(clamped_convert::<i64, u64>(u64::MAX), i64::MAX);
        assert_eq!(clamped_convert::<u16, u16>(1234), 1234);
    }

    #[test]
    fn test_clamped_convert_floats() {
        assert_eq!(clamped_convert::<u8, f32>(-3.5), 0);
        assert_eq!(clamped_convert::<i32, f64>(f64::NAN), 0);
        assert_eq!(clamped_convert::<f32, f64>(1.0e300), f32::MAX);
        assert_eq!(clamped_convert::<f64, i32>(-5), -5.0);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("Serial"), "Serial");
        assert_eq!(short_type_name("armature::serial::Serial"), "Serial");
        assert_eq!(short_type_name("a::B<c::D<e::F>>"), "B");
    }
}
