//! Resource quantity canonicalization
//!
//! The API server stores quantities in canonical form (`0.5` comes back as
//! `500m`, `1024Mi` as `1Gi`). Desired quantities are rewritten the same way
//! before comparison so a stored object never looks drifted.
//!
//! Values are held as nano-units, the finest precision the API server keeps;
//! anything finer is rounded away from zero.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

const NANOS_PER_UNIT: i128 = 1_000_000_000;
const DECIMAL_SUFFIXES: [(i32, &str); 10] = [
    (18, "E"), (15, "P"), (12, "T"), (9, "G"), (6, "M"), (3, "k"),
    (0, ""), (-3, "m"), (-6, "u"), (-9, "n"),
];
const BINARY_SUFFIXES: [(u32, &str); 7] = [
    (6, "Ei"), (5, "Pi"), (4, "Ti"), (3, "Gi"), (2, "Mi"), (1, "Ki"), (0, ""),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    DecimalSi,
    BinarySi,
    DecimalExponent,
}

/// Canonical form of `quantity`, or `None` if it does not parse.
pub fn canonical(quantity: &str) -> Option<String> {
    let (nanos, format) = parse(quantity.trim())?;
    if nanos == 0 {
        return Some("0".to_string());
    }
    if format == Format::BinarySi {
        if let Some(binary) = format_binary(nanos) {
            return Some(binary);
        }
    }
    Some(format_decimal(nanos, format == Format::DecimalExponent))
}

/// `requirements` with every quantity canonical and empty maps dropped.
///
/// Quantities that do not parse are kept verbatim; the API server rejects
/// them on write.
pub fn canonical_resources(requirements: &ResourceRequirements) -> ResourceRequirements {
    ResourceRequirements {
        limits: canonical_map(requirements.limits.as_ref()),
        requests: canonical_map(requirements.requests.as_ref()),
        claims: requirements.claims.clone().filter(|claims| !claims.is_empty()),
    }
}

fn canonical_map(map: Option<&BTreeMap<String, Quantity>>) -> Option<BTreeMap<String, Quantity>> {
    let map = map.filter(|m| !m.is_empty())?;
    Some(
        map.iter()
            .map(|(name, quantity)| {
                let value = canonical(&quantity.0).unwrap_or_else(|| quantity.0.clone());
                (name.clone(), Quantity(value))
            })
            .collect(),
    )
}

/// Splits `<sign><digits>[.<digits>]<suffix>` into nano-units and the suffix family.
fn parse(input: &str) -> Option<(i128, Format)> {
    let (negative, rest) = match input.as_bytes().first()? {
        b'-' => (true, &input[1..]),
        b'+' => (false, &input[1..]),
        _ => (false, input),
    };

    let number_len = rest.bytes()
        .position(|b| !(b.is_ascii_digit() || b == b'.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_len);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }

    let mut mantissa: i128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        mantissa = mantissa.checked_mul(10)?.checked_add(i128::from(digit - b'0'))?;
    }
    let fraction_digits = i32::try_from(fraction.len()).ok()?;

    let (format, nanos) = match suffix {
        "Ki" | "Mi" | "Gi" | "Ti" | "Pi" | "Ei" => {
            let power = BINARY_SUFFIXES.iter().find(|(_, s)| *s == suffix)?.0;
            let scaled = mantissa.checked_mul(1024_i128.checked_pow(power)?)?;
            (Format::BinarySi, scale_by_ten(scaled, 9 - fraction_digits)?)
        }
        s if s.len() > 1 && (s.starts_with('e') || s.starts_with('E')) => {
            let exponent: i32 = s[1..].parse().ok()?;
            (Format::DecimalExponent, scale_by_ten(mantissa, exponent.checked_add(9 - fraction_digits)?)?)
        }
        s => {
            let exponent = DECIMAL_SUFFIXES.iter().find(|(_, suffix)| *suffix == s)?.0;
            (Format::DecimalSi, scale_by_ten(mantissa, exponent + 9 - fraction_digits)?)
        }
    };

    Some((if negative { -nanos } else { nanos }, format))
}

/// `value * 10^exponent`, rounding a fractional result away from zero.
fn scale_by_ten(value: i128, exponent: i32) -> Option<i128> {
    let factor = 10_i128.checked_pow(exponent.unsigned_abs())?;
    if exponent >= 0 {
        value.checked_mul(factor)
    } else {
        let quotient = value / factor;
        Some(if value % factor == 0 { quotient } else { quotient + value.signum() })
    }
}

fn format_decimal(nanos: i128, exponent_form: bool) -> String {
    for (exponent, suffix) in DECIMAL_SUFFIXES {
        let unit = 10_i128.pow((exponent + 9).unsigned_abs());
        if nanos % unit == 0 {
            let mantissa = nanos / unit;
            return match (exponent_form, exponent) {
                (true, 0) => mantissa.to_string(),
                (true, _) => format!("{}e{}", mantissa, exponent),
                (false, _) => format!("{}{}", mantissa, suffix),
            };
        }
    }
    // Unreachable: the nano unit divides every value.
    nanos.to_string()
}

/// Binary form for whole values of at least 1024; smaller or fractional
/// values fall back to decimal, as the API server does.
fn format_binary(nanos: i128) -> Option<String> {
    if nanos % NANOS_PER_UNIT != 0 {
        return None;
    }
    let units = nanos / NANOS_PER_UNIT;
    if units.abs() < 1024 {
        return None;
    }
    BINARY_SUFFIXES.iter()
        .map(|(power, suffix)| (1024_i128.pow(*power), suffix))
        .find(|(unit, _)| units % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", units / unit, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_quantities() {
        assert_eq!(canonical("0.5").as_deref(), Some("500m"));
        assert_eq!(canonical("1000m").as_deref(), Some("1"));
        assert_eq!(canonical("1.5").as_deref(), Some("1500m"));
        assert_eq!(canonical("2000").as_deref(), Some("2k"));
        assert_eq!(canonical("100").as_deref(), Some("100"));
        assert_eq!(canonical("250m").as_deref(), Some("250m"));
        assert_eq!(canonical("0").as_deref(), Some("0"));
        assert_eq!(canonical("0.0000000001").as_deref(), Some("1n"));
    }

    #[test]
    fn test_binary_quantities() {
        assert_eq!(canonical("1024Mi").as_deref(), Some("1Gi"));
        assert_eq!(canonical("512Mi").as_deref(), Some("512Mi"));
        assert_eq!(canonical("0.5Gi").as_deref(), Some("512Mi"));
        assert_eq!(canonical("1.5Ki").as_deref(), Some("1536"));
        assert_eq!(canonical("0.5Ki").as_deref(), Some("512"));
    }

    #[test]
    fn test_exponent_quantities() {
        assert_eq!(canonical("1e3").as_deref(), Some("1e3"));
        assert_eq!(canonical("1000e0").as_deref(), Some("1e3"));
        assert_eq!(canonical("5e0").as_deref(), Some("5"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(canonical(""), None);
        assert_eq!(canonical("abc"), None);
        assert_eq!(canonical("1.2.3"), None);
        assert_eq!(canonical("12Xi"), None);
    }

    #[test]
    fn test_canonical_resources_drops_empty_maps() {
        let requirements = ResourceRequirements {
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity("0.5".to_string())),
                ("memory".to_string(), Quantity("1024Mi".to_string())),
            ])),
            requests: Some(BTreeMap::new()),
            claims: None,
        };

        let canonical = canonical_resources(&requirements);

        let limits = canonical.limits.unwrap();
        assert_eq!(limits["cpu"], Quantity("500m".to_string()));
        assert_eq!(limits["memory"], Quantity("1Gi".to_string()));
        assert_eq!(canonical.requests, None);
    }
}
