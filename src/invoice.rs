//! Invoice arithmetic: tax, totals, installment schedules and price strings.
//!
//! Amounts are held in minor units (paise / cents) so schedules always add
//! up to the total exactly. Percentages round half-up to whole currency
//! units; the final installment absorbs whatever the rounding left over.

use crate::error::{GenerateError, Result};
use crate::substitute::{PlaceholderMap, AMOUNT_IN_WORDS_TOKEN};
use crate::words::amount_to_words;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Tax rate applied to every invoice, in percent.
pub const TAX_RATE_PERCENT: i64 = 18;

/// Upper bound on accepted base amounts (whole units).
const MAX_UNITS: i64 = 1_000_000_000_000;

/// A money amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Money(i64);

impl Money {
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn from_units(units: i64) -> Self {
        Money(units * 100)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Whole currency units, fraction dropped.
    pub const fn whole_units(self) -> i64 {
        self.0 / 100
    }

    /// Parse a non-negative decimal amount such as `333.33` or `10,000`.
    pub fn parse(input: &str) -> Result<Self> {
        let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
        let value: f64 = cleaned
            .parse()
            .map_err(|_| GenerateError::invalid(format!("amount '{}' is not a number", input)))?;
        Self::from_f64(value)
    }

    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(GenerateError::invalid(format!("amount {} is not finite", value)));
        }
        if value < 0.0 {
            return Err(GenerateError::invalid(format!("amount {} is negative", value)));
        }
        if value >= MAX_UNITS as f64 {
            return Err(GenerateError::invalid(format!("amount {} is too large", value)));
        }
        Ok(Money((value * 100.0).round() as i64))
    }

    /// `self × percent / 100`, rounded half-up to whole units.
    pub fn percent_rounded(self, percent: i64) -> Money {
        Money::from_units((self.0 * percent + 5_000) / 10_000)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::default(), Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Region / scheme
// ============================================================================

/// Billing region; decides currency label and available schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Inr,
    Usd,
}

impl Region {
    pub fn code(self) -> &'static str {
        match self {
            Region::Inr => "INR",
            Region::Usd => "USD",
        }
    }

    /// Payment schemes offered for this region.
    pub fn schemes(self) -> &'static [PaymentScheme] {
        match self {
            Region::Inr => &[
                PaymentScheme::OnePayment,
                PaymentScheme::ThreeEmi,
                PaymentScheme::FiveEmi,
            ],
            Region::Usd => &[PaymentScheme::ThreeEmi, PaymentScheme::FiveEmi],
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Region::Inr),
            "USD" => Ok(Region::Usd),
            other => Err(GenerateError::invalid(format!("unknown region '{}'", other))),
        }
    }
}

/// How the invoice total is split into installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentScheme {
    OnePayment,
    ThreeEmi,
    FiveEmi,
}

impl PaymentScheme {
    pub fn label(self) -> &'static str {
        match self {
            PaymentScheme::OnePayment => "1 Payment",
            PaymentScheme::ThreeEmi => "3 EMI",
            PaymentScheme::FiveEmi => "5 EMI",
        }
    }

    /// Percentage weight of each installment; the last entry is informational
    /// since the final slot takes the remainder.
    pub fn weights(self) -> &'static [i64] {
        match self {
            PaymentScheme::OnePayment => &[100],
            PaymentScheme::ThreeEmi => &[30, 40, 30],
            PaymentScheme::FiveEmi => &[20, 20, 20, 20, 20],
        }
    }
}

impl fmt::Display for PaymentScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PaymentScheme {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "1" | "1payment" | "one" | "onepayment" | "full" => Ok(PaymentScheme::OnePayment),
            "3" | "3emi" | "threeemi" => Ok(PaymentScheme::ThreeEmi),
            "5" | "5emi" | "fiveemi" => Ok(PaymentScheme::FiveEmi),
            _ => Err(GenerateError::invalid(format!("unknown payment scheme '{}'", s))),
        }
    }
}

// ============================================================================
// Calculation
// ============================================================================

pub fn tax(base: Money) -> Money {
    base.percent_rounded(TAX_RATE_PERCENT)
}

pub fn total(base: Money) -> Money {
    base + tax(base)
}

/// Split `total` by `weights`; every slot but the last is rounded, the last
/// takes the rest so the parts sum to `total`.
pub fn split_installments(total: Money, weights: &[i64]) -> Vec<Money> {
    let Some((_, leading)) = weights.split_last() else {
        return Vec::new();
    };
    let mut parts: Vec<Money> = leading.iter().map(|w| total.percent_rounded(*w)).collect();
    let assigned: Money = parts.iter().copied().sum();
    parts.push(total - assigned);
    parts
}

/// Derived amounts for one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceSchedule {
    pub scheme: PaymentScheme,
    pub base: Money,
    pub tax_rate: i64,
    pub tax: Money,
    pub total: Money,
    pub installments: Vec<Money>,
}

impl InvoiceSchedule {
    pub fn compute(base: Money, scheme: PaymentScheme) -> Self {
        let tax = tax(base);
        let total = base + tax;
        Self {
            scheme,
            base,
            tax_rate: TAX_RATE_PERCENT,
            tax,
            total,
            installments: split_installments(total, scheme.weights()),
        }
    }

    /// Amount placeholders for the scheme's template.
    pub fn placeholders(&self, region: Region) -> PlaceholderMap {
        let price = |m: Money| format_price(m, region);
        let mut map = PlaceholderMap::new()
            .with(AMOUNT_IN_WORDS_TOKEN, amount_to_words(self.total.whole_units()))
            .with("<<Tax Rate>>", format_percentage(self.tax_rate))
            .with("<<Total 1>>", price(self.total));

        match self.scheme {
            PaymentScheme::OnePayment => {
                map.insert("<<Price 1>>", price(self.base));
                map.insert("<<Price 2>>", price(self.tax));
                map.insert("<<Price 3>>", price(self.total));
            }
            PaymentScheme::ThreeEmi => {
                let n = self.installments.len();
                // Installment table, then tax and total, then the schedule repeated
                for (i, part) in self.installments.iter().enumerate() {
                    map.insert(format!("<<Price {}>>", i + 1), price(*part));
                    map.insert(format!("<<Price {}>>", n + 3 + i), price(*part));
                }
                map.insert(format!("<<Price {}>>", n + 1), price(self.tax));
                map.insert(format!("<<Price {}>>", n + 2), price(self.total));
            }
            PaymentScheme::FiveEmi => {
                let n = self.installments.len();
                for (i, part) in self.installments.iter().enumerate() {
                    map.insert(format!("<<Price {}>>", i + 1), price(*part));
                    map.insert(format!("<<Price {}>>", n + 1 + i), price(*part));
                }
            }
        }
        map
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Group whole units with commas: `1234567` → `1,234,567`.
fn group_thousands(units: i64) -> String {
    let digits = units.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if units < 0 {
        out.insert(0, '-');
    }
    out
}

/// `USD 1,234.50` for USD, `Rs. 1,234.50` otherwise.
pub fn format_price(amount: Money, region: Region) -> String {
    let number = format!(
        "{}.{:02}",
        group_thousands(amount.minor() / 100),
        (amount.minor() % 100).abs()
    );
    match region {
        Region::Usd => format!("USD {}", number),
        Region::Inr => format!("Rs. {}", number),
    }
}

pub fn format_percentage(rate: i64) -> String {
    format!("{}%", rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_tax_rounds_half_up() {
        assert_eq!(tax(m("100.00")), Money::from_units(18));
        assert_eq!(total(m("100.00")), m("118.00"));
        // 2.50 tax rounds up, 2.49 rounds down
        assert_eq!(tax(m("13.8889")), Money::from_units(3));
        assert_eq!(tax(m("13.83")), Money::from_units(2));
        assert_eq!(tax(m("0")), Money::default());
    }

    #[test]
    fn test_three_emi_reference_invoice() {
        let s = InvoiceSchedule::compute(m("10000"), PaymentScheme::ThreeEmi);
        assert_eq!(s.tax, Money::from_units(1800));
        assert_eq!(s.total, Money::from_units(11800));
        assert_eq!(
            s.installments,
            vec![
                Money::from_units(3540),
                Money::from_units(4720),
                Money::from_units(3540)
            ]
        );
    }

    #[test]
    fn test_installments_always_sum_to_total() {
        let bases = [
            "0", "0.01", "1", "99.99", "100", "333.33", "1000.5", "12345.67", "99999.99",
            "250000", "7",
        ];
        for base in bases {
            for scheme in [
                PaymentScheme::OnePayment,
                PaymentScheme::ThreeEmi,
                PaymentScheme::FiveEmi,
            ] {
                let s = InvoiceSchedule::compute(m(base), scheme);
                assert_eq!(s.installments.len(), scheme.weights().len());
                let sum: Money = s.installments.iter().copied().sum();
                assert_eq!(sum, s.total, "base {} scheme {}", base, scheme);
                assert_eq!(s.total, s.base + s.tax);
            }
        }
    }

    #[test]
    fn test_last_slot_absorbs_fraction() {
        // 333.33 + 60 tax = 393.33; 30% = 118, 40% = 157, rest 118.33
        let s = InvoiceSchedule::compute(m("333.33"), PaymentScheme::ThreeEmi);
        assert_eq!(s.total, m("393.33"));
        assert_eq!(s.installments[0], Money::from_units(118));
        assert_eq!(s.installments[1], Money::from_units(157));
        assert_eq!(s.installments[2], m("118.33"));

        let five = InvoiceSchedule::compute(m("333.33"), PaymentScheme::FiveEmi);
        assert_eq!(five.installments[..4], [Money::from_units(79); 4]);
        assert_eq!(five.installments[4], m("77.33"));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(m("1234.5"), Region::Usd), "USD 1,234.50");
        assert_eq!(format_price(m("1234.5"), Region::Inr), "Rs. 1,234.50");
        assert_eq!(format_price(m("0"), Region::Inr), "Rs. 0.00");
        assert_eq!(format_price(m("999"), Region::Usd), "USD 999.00");
        assert_eq!(format_price(m("1234567.89"), Region::Inr), "Rs. 1,234,567.89");
        assert_eq!(format_percentage(18), "18%");
    }

    #[test]
    fn test_money_parse_rejects_bad_input() {
        assert_eq!(m("10,000.50"), Money::from_minor(1_000_050));
        assert_eq!(m(" 333.33 "), Money::from_minor(33_333));
        assert!(matches!(Money::parse("-5"), Err(GenerateError::InvalidInput(_))));
        assert!(matches!(Money::parse("abc"), Err(GenerateError::InvalidInput(_))));
        assert!(matches!(Money::parse("NaN"), Err(GenerateError::InvalidInput(_))));
        assert!(Money::parse("").is_err());
        assert_eq!(m("12.5").to_string(), "12.50");
    }

    #[test]
    fn test_region_and_scheme_parsing() {
        assert_eq!("usd".parse::<Region>().unwrap(), Region::Usd);
        assert!("EUR".parse::<Region>().is_err());
        assert_eq!("3 EMI".parse::<PaymentScheme>().unwrap(), PaymentScheme::ThreeEmi);
        assert_eq!("1-payment".parse::<PaymentScheme>().unwrap(), PaymentScheme::OnePayment);
        assert_eq!("5emi".parse::<PaymentScheme>().unwrap(), PaymentScheme::FiveEmi);
        assert!(!Region::Usd.schemes().contains(&PaymentScheme::OnePayment));
        assert_eq!(Region::Inr.schemes().len(), 3);
    }

    #[test]
    fn test_placeholders_per_scheme() {
        let one = InvoiceSchedule::compute(m("10000"), PaymentScheme::OnePayment).placeholders(Region::Inr);
        assert_eq!(one.get("<<Price 1>>"), Some("Rs. 10,000.00"));
        assert_eq!(one.get("<<Price 2>>"), Some("Rs. 1,800.00"));
        assert_eq!(one.get("<<Price 3>>"), Some("Rs. 11,800.00"));
        assert_eq!(one.get("<<Total 1>>"), Some("Rs. 11,800.00"));
        assert_eq!(one.get(AMOUNT_IN_WORDS_TOKEN), Some("Eleven Thousand Eight Hundred"));
        assert_eq!(one.get("<<Tax Rate>>"), Some("18%"));

        let three = InvoiceSchedule::compute(m("10000"), PaymentScheme::ThreeEmi).placeholders(Region::Usd);
        assert_eq!(three.get("<<Price 2>>"), Some("USD 4,720.00"));
        assert_eq!(three.get("<<Price 4>>"), Some("USD 1,800.00"));
        assert_eq!(three.get("<<Price 5>>"), Some("USD 11,800.00"));
        assert_eq!(three.get("<<Price 7>>"), Some("USD 4,720.00"));
        assert_eq!(three.get("<<Price 9>>"), None);

        let five = InvoiceSchedule::compute(m("10000"), PaymentScheme::FiveEmi).placeholders(Region::Inr);
        assert_eq!(five.get("<<Price 5>>"), Some("Rs. 2,360.00"));
        assert_eq!(five.get("<<Price 10>>"), Some("Rs. 2,360.00"));
        assert_eq!(five.get("<<Total 1>>"), Some("Rs. 11,800.00"));
    }
}
