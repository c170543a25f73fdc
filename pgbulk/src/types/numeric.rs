use std::fmt;
use std::str::FromStr;

use bigdecimal::num_bigint::Sign;
use bigdecimal::{BigDecimal, ParseBigDecimalError};

/// A Postgres `numeric` value, including its special values.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Clone)]
pub enum PgNumeric {
    NaN,
    PositiveInf,
    NegativeInf,
    Value(BigDecimal),
}

impl FromStr for PgNumeric {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match BigDecimal::from_str(s) {
            Ok(n) => Ok(PgNumeric::Value(n)),
            Err(e) => {
                if s.eq_ignore_ascii_case("infinity") {
                    Ok(PgNumeric::PositiveInf)
                } else if s.eq_ignore_ascii_case("-infinity") {
                    Ok(PgNumeric::NegativeInf)
                } else if s.eq_ignore_ascii_case("nan") {
                    Ok(PgNumeric::NaN)
                } else {
                    Err(e)
                }
            }
        }
    }
}

impl From<BigDecimal> for PgNumeric {
    fn from(value: BigDecimal) -> Self {
        PgNumeric::Value(value)
    }
}

/// Renders the value in plain notation, never with an exponent.
///
/// The scale is preserved, so `1.50` stays `1.50` and `1E+10` becomes `10000000000`.
impl fmt::Display for PgNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgNumeric::NaN => f.write_str("NaN"),
            PgNumeric::PositiveInf => f.write_str("Infinity"),
            PgNumeric::NegativeInf => f.write_str("-Infinity"),
            PgNumeric::Value(decimal) => write_plain(decimal, f),
        }
    }
}

fn write_plain(decimal: &BigDecimal, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (bigint, scale) = decimal.as_bigint_and_exponent();
    let digits = bigint.magnitude().to_string();

    if bigint.sign() == Sign::Minus {
        f.write_str("-")?;
    }

    if scale <= 0 {
        f.write_str(&digits)?;
        if bigint.sign() != Sign::NoSign {
            for _ in 0..scale.unsigned_abs() {
                f.write_str("0")?;
            }
        }

        return Ok(());
    }

    let scale = scale as usize;
    if digits.len() > scale {
        let (integer, fraction) = digits.split_at(digits.len() - scale);
        write!(f, "{integer}.{fraction}")
    } else {
        f.write_str("0.")?;
        for _ in 0..scale - digits.len() {
            f.write_str("0")?;
        }
        f.write_str(&digits)
    }
}
