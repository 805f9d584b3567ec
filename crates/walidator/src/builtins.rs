//! Built-in rules
//!
//! nonzero, required, len, min, max, regexp, uuid, latitude and longitude.
//! Each compiler checks the target kind and parses its parameter up front;
//! the returned check only inspects the value.

use crate::errors::{ErrorKind, RuleError};
use crate::inspect::{Kind, View};
use crate::registry::{rule_fn, RuleFn, RuleRegistry, Target};
use once_cell::sync::Lazy;
use regex::Regex;

/// RFC 4122 UUID, case-insensitive
static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .unwrap()
});

/// Register every built-in rule into `registry`
pub fn register_all(registry: &mut RuleRegistry) {
    let builtins: [(&str, fn(&Target<'_>, &str) -> Result<RuleFn, RuleError>); 9] = [
        ("nonzero", nonzero),
        ("required", required),
        ("len", length),
        ("min", min),
        ("max", max),
        ("regexp", regexp),
        ("uuid", uuid),
        ("latitude", latitude),
        ("longitude", longitude),
    ];
    for (name, compiler) in builtins {
        let registered = registry.register(name, compiler);
        debug_assert!(registered.is_ok(), "built-in rule name {:?} rejected", name);
    }
}

// ============================================================================
// Presence Rules
// ============================================================================

/// Fails when the value equals its type's zero value: empty string or
/// collection, absent optional, `0`, `0.0` or `false`.
pub fn nonzero(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
    match target.kind() {
        Kind::Str
        | Kind::Optional
        | Kind::Boxed
        | Kind::Seq
        | Kind::Array
        | Kind::Map
        | Kind::Int
        | Kind::Uint
        | Kind::Float
        | Kind::Bool => Ok(rule_fn(|value, report| {
            let zero = match value {
                View::Str(s) => s.is_empty(),
                View::Pointer(p) => p.is_none(),
                View::Seq(items) => items.is_empty(),
                View::Map(entries) => entries.is_empty(),
                View::Int(n) => *n == 0,
                View::Uint(n) => *n == 0,
                View::Float(x) => *x == 0.0,
                View::Bool(b) => !*b,
                _ => false,
            };
            if zero {
                report.fail(ErrorKind::ZeroValue, "zero value");
            }
        })),
        _ => Err(target.unsupported()),
    }
}

/// Fails when an optional value is absent. Sequences, arrays and maps are
/// always present.
pub fn required(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
    match target.kind() {
        Kind::Optional | Kind::Boxed | Kind::Dynamic | Kind::Seq | Kind::Array | Kind::Map => {
            Ok(rule_fn(|value, report| {
                if let View::Pointer(None) = value {
                    report.fail(ErrorKind::Required, "required value is missing");
                }
            }))
        }
        _ => Err(target.unsupported()),
    }
}

// ============================================================================
// Size Rules
// ============================================================================

/// Parsed parameter of a size rule, typed after the target kind
#[derive(Debug, Clone, Copy)]
enum Bound {
    /// Length of strings and collections, or a signed value
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Bound {
    fn parse(target: &Target<'_>, param: &str) -> Result<Self, RuleError> {
        let kind = target.kind();
        match kind {
            Kind::Str | Kind::Seq | Kind::Array | Kind::Map | Kind::Int => {
                parse_int(param).map(Bound::Int)
            }
            Kind::Uint => parse_uint(param).map(Bound::Uint),
            Kind::Float => parse_float(param).map(Bound::Float),
            _ => Err(target.unsupported()),
        }
    }

    /// Compare the value (or its length) with the bound
    fn compare(self, value: &View<'_>) -> Option<std::cmp::Ordering> {
        match (self, value) {
            (Bound::Int(bound), View::Int(n)) => Some(n.cmp(&bound)),
            (Bound::Uint(bound), View::Uint(n)) => Some(n.cmp(&bound)),
            (Bound::Float(bound), View::Float(x)) => x.partial_cmp(&bound),
            (Bound::Int(bound), other) => other.len().map(|len| (len as i64).cmp(&bound)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Uint(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Length of strings (in characters) and collections, or numeric value,
/// must equal the parameter.
pub fn length(target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError> {
    let bound = Bound::parse(target, param)?;
    Ok(rule_fn(move |value, report| {
        if bound.compare(value) != Some(std::cmp::Ordering::Equal) {
            report.fail(ErrorKind::Len, format!("invalid length, expected {}", bound));
        }
    }))
}

/// Length or numeric value must be at least the parameter
pub fn min(target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError> {
    let bound = Bound::parse(target, param)?;
    Ok(rule_fn(move |value, report| {
        if bound.compare(value) == Some(std::cmp::Ordering::Less) {
            report.fail(ErrorKind::Min, format!("less than min {}", bound));
        }
    }))
}

/// Length or numeric value must be at most the parameter
pub fn max(target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError> {
    let bound = Bound::parse(target, param)?;
    Ok(rule_fn(move |value, report| {
        if bound.compare(value) == Some(std::cmp::Ordering::Greater) {
            report.fail(ErrorKind::Max, format!("greater than max {}", bound));
        }
    }))
}

// ============================================================================
// String Rules
// ============================================================================

/// String must match the regular expression given as parameter
pub fn regexp(target: &Target<'_>, param: &str) -> Result<RuleFn, RuleError> {
    if target.kind() != Kind::Str {
        return Err(target.unsupported());
    }
    let re = Regex::new(param).map_err(|e| RuleError::bad_parameter(param, e.to_string()))?;
    Ok(rule_fn(move |value, report| {
        if let View::Str(s) = value {
            if !re.is_match(s) {
                report.fail(ErrorKind::Regexp, "regular expression mismatch");
            }
        }
    }))
}

/// String must be an RFC 4122 UUID
pub fn uuid(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
    if target.kind() != Kind::Str {
        return Err(target.unsupported());
    }
    Ok(rule_fn(|value, report| {
        if let View::Str(s) = value {
            if !UUID_REGEX.is_match(s) {
                report.fail(ErrorKind::Uuid, "invalid UUID");
            }
        }
    }))
}

// ============================================================================
// Coordinate Rules
// ============================================================================

/// Float, or string holding a float, within [-90, 90]
pub fn latitude(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
    coordinate(target, 90.0, ErrorKind::Latitude, "latitude")
}

/// Float, or string holding a float, within [-180, 180]
pub fn longitude(target: &Target<'_>, _param: &str) -> Result<RuleFn, RuleError> {
    coordinate(target, 180.0, ErrorKind::Longitude, "longitude")
}

fn coordinate(
    target: &Target<'_>,
    limit: f64,
    kind: ErrorKind,
    name: &'static str,
) -> Result<RuleFn, RuleError> {
    if !matches!(target.kind(), Kind::Float | Kind::Str) {
        return Err(target.unsupported());
    }
    Ok(rule_fn(move |value, report| {
        let degrees = match value {
            View::Float(x) => *x,
            View::Str(s) => match s.trim().parse::<f64>() {
                Ok(x) => x,
                Err(_) => {
                    report.fail(ErrorKind::BadFormat, format!("invalid {} format: {:?}", name, s));
                    return;
                }
            },
            _ => return,
        };
        if !(-limit..=limit).contains(&degrees) {
            report.fail(kind, format!("invalid {} {}", name, degrees));
        }
    }))
}

// ============================================================================
// Parameter Parsing
// ============================================================================

/// Parse an integer with optional sign, `0x`/`0o`/`0b` prefix and `_`
/// separators
fn parse_int(param: &str) -> Result<i64, RuleError> {
    let (negative, digits) = match param.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, param.strip_prefix('+').unwrap_or(param)),
    };
    let magnitude = i128::from(parse_magnitude(param, digits, "an integer")?);
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).map_err(|_| RuleError::bad_parameter(param, "integer out of range"))
}

fn parse_uint(param: &str) -> Result<u64, RuleError> {
    let digits = param.strip_prefix('+').unwrap_or(param);
    parse_magnitude(param, digits, "an unsigned integer")
}

fn parse_magnitude(param: &str, digits: &str, expected: &str) -> Result<u64, RuleError> {
    let (radix, digits) = match digits.get(..2) {
        Some("0x") | Some("0X") => (16, &digits[2..]),
        Some("0o") | Some("0O") => (8, &digits[2..]),
        Some("0b") | Some("0B") => (2, &digits[2..]),
        _ => (10, digits),
    };
    let cleaned = digits.replace('_', "");
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_digit(radix)) {
        return Err(RuleError::bad_parameter(param, format!("should be {}", expected)));
    }
    u64::from_str_radix(&cleaned, radix)
        .map_err(|e| RuleError::bad_parameter(param, e.to_string()))
}

fn parse_float(param: &str) -> Result<f64, RuleError> {
    param
        .parse::<f64>()
        .map_err(|_| RuleError::bad_parameter(param, "should be a float"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{Inspect, TypeRef};
    use crate::path::{PathTracker, Reporter};
    use crate::errors::ValidationErrors;

    type Compiler = fn(&Target<'_>, &str) -> Result<RuleFn, RuleError>;

    fn bind<T: Inspect>(compiler: Compiler, param: &str) -> Result<RuleFn, RuleError> {
        let ty = TypeRef::of::<T>();
        let shape = ty.shape();
        compiler(&Target::new(ty, &shape), param)
    }

    fn check<T: Inspect>(compiler: Compiler, param: &str, value: &T) -> ValidationErrors {
        let rule = bind::<T>(compiler, param).unwrap();
        let mut path = PathTracker::new();
        rule(&value.view(), &mut Reporter::new(&mut path, "rule"));
        path.finalize().err().unwrap_or_default()
    }

    #[test]
    fn test_register_all_into_empty_registry() {
        let mut registry = RuleRegistry::new();
        register_all(&mut registry);
        assert_eq!(
            registry.names(),
            vec![
                "latitude", "len", "longitude", "max", "min", "nonzero", "regexp", "required",
                "uuid",
            ]
        );

        // Registering twice replaces in place
        register_all(&mut registry);
        assert_eq!(registry.len(), 9);
    }

    #[test]
    fn test_nonzero() {
        assert!(check(nonzero, "", &0i64).is_zero_value(""));
        assert!(check(nonzero, "", &1i64).is_empty());
        assert!(check(nonzero, "", &0u8).is_zero_value(""));
        assert!(check(nonzero, "", &0.0f64).is_zero_value(""));
        assert!(check(nonzero, "", &12.34f64).is_empty());
        assert!(check(nonzero, "", &false).is_zero_value(""));
        assert!(check(nonzero, "", &String::new()).is_zero_value(""));
        assert!(check(nonzero, "", &Vec::<i32>::new()).is_zero_value(""));
        assert!(check(nonzero, "", &None::<i32>).is_zero_value(""));
        assert!(check(nonzero, "", &Some(0i32)).is_empty());
    }

    #[test]
    fn test_nonzero_unsupported_on_opaque() {
        assert!(matches!(bind::<()>(nonzero, ""), Err(RuleError::Unsupported { .. })));
    }

    #[test]
    fn test_required() {
        assert!(check(required, "", &None::<String>).is_required(""));
        assert!(check(required, "", &Some(String::new())).is_empty());
        assert!(check(required, "", &Vec::<u8>::new()).is_empty());
        assert!(matches!(bind::<String>(required, ""), Err(RuleError::Unsupported { .. })));
    }

    #[test]
    fn test_length() {
        assert!(check(length, "8", &"test1234".to_string()).is_empty());
        assert!(check(length, "0", &"test1234".to_string()).is_len(""));
        assert!(check(length, "3", &vec![1, 2, 3]).is_empty());
        assert!(check(length, "5", &5u32).is_empty());
        assert!(check(length, "1.5", &1.5f64).is_empty());
        assert!(check(length, "2", &"日本".to_string()).is_empty());
    }

    #[test]
    fn test_min_max() {
        assert!(check(min, "124", &123i64).is_min(""));
        assert!(check(min, "1", &123i64).is_empty());
        assert!(check(max, "122", &123i64).is_max(""));
        assert!(check(max, "10", &123i64).is_max(""));
        assert!(check(min, "6", &"12345".to_string()).is_min(""));
        assert!(check(max, "4", &"12345".to_string()).is_max(""));
        assert!(check(min, "-5", &-3i32).is_empty());
        assert!(check(max, "0x10", &16u16).is_empty());
        assert!(check(max, "0x10", &17u16).is_max(""));
        assert!(check(min, "1_000", &999u64).is_min(""));
    }

    #[test]
    fn test_min_max_maps() {
        let mut map = std::collections::HashMap::new();
        assert!(check(min, "1", &map).is_min(""));
        map.insert("A".to_string(), "a".to_string());
        map.insert("B".to_string(), "a".to_string());
        assert!(check(max, "1", &map).is_max(""));
        assert!(check(min, "2", &map).is_empty());
    }

    #[test]
    fn test_bad_parameters() {
        for param in ["", "=", "foo", "1.5"] {
            assert!(
                matches!(bind::<String>(min, param), Err(RuleError::BadParameter { .. })),
                "param {:?}",
                param
            );
        }
        assert!(matches!(bind::<u8>(max, "-1"), Err(RuleError::BadParameter { .. })));
        assert!(matches!(bind::<f64>(length, "abc"), Err(RuleError::BadParameter { .. })));
        assert!(matches!(bind::<i8>(min, "99999999999999999999"), Err(RuleError::BadParameter { .. })));
    }

    #[test]
    fn test_regexp() {
        assert!(check(regexp, "^[tes]{4}.*", &"test1234".to_string()).is_empty());
        assert!(check(regexp, "^.*[0-9]{5}$", &"test1234".to_string()).is_regexp(""));
        assert!(matches!(bind::<i64>(regexp, "a.*b"), Err(RuleError::Unsupported { .. })));
        assert!(matches!(bind::<String>(regexp, "(unclosed"), Err(RuleError::BadParameter { .. })));
    }

    #[test]
    fn test_uuid() {
        for ok in [
            "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
            "0FCE98AC-1326-4C79-8EBC-94908DA8B034",
        ] {
            assert!(check(uuid, "", &ok.to_string()).is_empty(), "{}", ok);
        }
        for bad in ["1234", "0VCE98AC-1326-4C79-8EBC-94908DA8B034"] {
            assert!(check(uuid, "", &bad.to_string()).has("", ErrorKind::Uuid), "{}", bad);
        }
    }

    #[test]
    fn test_coordinates() {
        assert!(check(latitude, "", &23.0f64).is_empty());
        assert!(check(latitude, "", &-90.0f64).is_empty());
        assert!(check(latitude, "", &90.5f64).has("", ErrorKind::Latitude));
        assert!(check(longitude, "", &-180.0f64).is_empty());
        assert!(check(longitude, "", &181.0f64).has("", ErrorKind::Longitude));
        assert!(check(latitude, "", &"45.5".to_string()).is_empty());
        assert!(check(latitude, "", &"-91".to_string()).has("", ErrorKind::Latitude));

        let errs = check(longitude, "", &"east".to_string());
        assert!(errs.has("", ErrorKind::BadFormat));
        assert!(!errs.has("", ErrorKind::Longitude));
        assert!(errs.get("")[0].message.contains("east"));

        assert!(matches!(bind::<i64>(latitude, ""), Err(RuleError::Unsupported { .. })));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("10").unwrap(), 10);
        assert_eq!(parse_int("-10").unwrap(), -10);
        assert_eq!(parse_int("+7").unwrap(), 7);
        assert_eq!(parse_int("0b101").unwrap(), 5);
        assert_eq!(parse_int("0o17").unwrap(), 15);
        assert_eq!(parse_int("-0x8000000000000000").unwrap(), i64::MIN);
        assert!(parse_int("").is_err());
        assert!(parse_int("--1").is_err());
        assert!(parse_int("0x").is_err());
    }
}
