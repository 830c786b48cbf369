//! Per-run test data: generated identities, addresses, cards and coupons

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed deviation, in percentage points, between the observed and expected discount
pub const DISCOUNT_TOLERANCE: f64 = 2.0;

/// A throwaway patient identity, built fresh for every test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdentity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// MM/DD/YYYY, the format the questionnaire date field expects
    pub date_of_birth: String,
    pub phone: String,
}

impl TestIdentity {
    /// `local+<random>@domain`, routed back to a shared QA inbox
    pub fn generate(local: &str, domain: &str) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        Self {
            email: format!("{}+{}@{}", local, suffix, domain),
            first_name: "Test".to_string(),
            last_name: "Automation".to_string(),
            date_of_birth: "01/15/1990".to_string(),
            phone: "5555550123".to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    pub fn test_address() -> Self {
        Self {
            street: "123 Main Street".to_string(),
            unit: Some("Apt 4".to_string()),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip: "78701".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCard {
    pub number: String,
    /// MM/YY
    pub expiry: String,
    pub cvc: String,
    pub zip: String,
}

impl PaymentCard {
    /// Stripe's always-succeeding Visa test number
    pub fn stripe_test() -> Self {
        Self {
            number: "4242424242424242".to_string(),
            expiry: "12/34".to_string(),
            cvc: "123".to_string(),
            zip: "78701".to_string(),
        }
    }

    /// Build a card from injected configuration. All four parts must be present.
    pub fn from_parts(
        number: Option<String>,
        expiry: Option<String>,
        cvc: Option<String>,
        zip: Option<String>,
    ) -> Option<Self> {
        match (number, expiry, cvc, zip) {
            (Some(number), Some(expiry), Some(cvc), Some(zip))
                if ![&number, &expiry, &cvc, &zip].iter().any(|s| s.trim().is_empty()) =>
            {
                Some(Self {
                    number: number.chars().filter(|c| !c.is_whitespace()).collect(),
                    expiry,
                    cvc,
                    zip,
                })
            }
            _ => None,
        }
    }

    pub fn last4(&self) -> &str {
        let start = self.number.len().saturating_sub(4);
        &self.number[start..]
    }

    pub fn is_stripe_test(&self) -> bool {
        self.number == "4242424242424242"
    }
}

impl fmt::Debug for PaymentCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentCard")
            .field("number", &format!("**** {}", self.last4()))
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

// Numbers must start at a digit boundary so years and prices never yield a percentage
static PERCENT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\D)(\d{1,3})\s*(?:%|pct|percent|off)").expect("valid regex")
});

static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\D)(\d{1,3})$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
}

impl Coupon {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into().trim().to_string() }
    }

    /// The discount a coupon promises, read from its code: `TEST99OFF`,
    /// `SAVE-20%` or a trailing `...99`. `None` when nothing in range is found.
    pub fn expected_discount(&self) -> Option<f64> {
        let in_range = |n: u32| (1..=100).contains(&n).then_some(n as f64);

        PERCENT_MARKER
            .captures_iter(&self.code)
            .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
            .find_map(in_range)
            .or_else(|| {
                TRAILING_NUMBER
                    .captures(&self.code)
                    .and_then(|c| c.get(1)?.as_str().parse::<u32>().ok())
                    .and_then(in_range)
            })
    }

    /// Matches the near-free coupons used for production runs on a real card
    pub fn is_near_free(&self) -> bool {
        self.expected_discount().map(|d| d >= 99.0).unwrap_or(false)
    }
}

impl fmt::Display for Coupon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Discount actually granted, as a percentage of the original price
pub fn discount_percent(price_before: f64, price_after: f64) -> Option<f64> {
    if !(price_before.is_finite() && price_after.is_finite()) || price_before <= 0.0 {
        return None;
    }
    Some((price_before - price_after) / price_before * 100.0)
}

/// Whether `actual` lies within `expected ± DISCOUNT_TOLERANCE` (inclusive)
pub fn discount_within_tolerance(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() <= DISCOUNT_TOLERANCE + f64::EPSILON * 100.0
}

const AMOUNT: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)";

static DOLLAR_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"\$\s*{}", AMOUNT)).expect("valid regex"));
static BARE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(AMOUNT).expect("valid regex"));

/// Pull the dollar amount out of rendered text, e.g. `"Total (3 months) $597.00"`.
/// Text without a `$` falls back to its first number.
pub fn parse_price(text: &str) -> Option<f64> {
    let pattern = if text.contains('$') { &*DOLLAR_PRICE } else { &*BARE_PRICE };
    let caps = pattern.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_identity_email_shape() {
        let identity = TestIdentity::generate("qa", "lumimeds.com");
        let (local, domain) = identity.email.split_once('@').unwrap();
        assert_eq!(domain, "lumimeds.com");
        let (prefix, suffix) = local.split_once('+').unwrap();
        assert_eq!(prefix, "qa");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_identities_are_unique() {
        let a = TestIdentity::generate("qa", "lumimeds.com");
        let b = TestIdentity::generate("qa", "lumimeds.com");
        assert_ne!(a.email, b.email);
    }

    #[test_case("TEST99OFF", Some(99.0) ; "number before off")]
    #[test_case("save-20%", Some(20.0) ; "percent sign")]
    #[test_case("LUMI50PCT", Some(50.0) ; "pct suffix")]
    #[test_case("QAHOLIDAY99", Some(99.0) ; "trailing number")]
    #[test_case("FREESHIP", None ; "no number")]
    #[test_case("MEGA500OFF", None ; "out of range")]
    #[test_case("NEWYEAR2025", None ; "year suffix")]
    #[test_case("X1050OFF", None ; "off after a long number")]
    #[test_case("SPRING2025-25OFF", Some(25.0) ; "marker after a year")]
    #[test_case("25OFF", Some(25.0) ; "marker at start")]
    fn test_expected_discount(code: &str, expected: Option<f64>) {
        assert_eq!(Coupon::new(code).expected_discount(), expected);
    }

    #[test]
    fn test_near_free_pattern() {
        assert!(Coupon::new("TEST99OFF").is_near_free());
        assert!(!Coupon::new("SAVE20").is_near_free());
    }

    #[test]
    fn test_discount_percent() {
        let pct = discount_percent(299.0, 2.99).unwrap();
        assert!((pct - 99.0).abs() < 1e-9);
        assert_eq!(discount_percent(0.0, 0.0), None);
    }

    #[test_case(99.0, 99.0, true ; "exact")]
    #[test_case(97.0, 99.0, true ; "lower edge")]
    #[test_case(101.0, 99.0, true ; "upper edge")]
    #[test_case(96.9, 99.0, false ; "below band")]
    #[test_case(0.0, 99.0, false ; "coupon ignored")]
    fn test_tolerance_band(actual: f64, expected: f64, ok: bool) {
        assert_eq!(discount_within_tolerance(actual, expected), ok);
    }

    #[test_case("$299.00", Some(299.0))]
    #[test_case("Total: $1,299.50 / month", Some(1299.5))]
    #[test_case("$ 2.99", Some(2.99))]
    #[test_case("Free", None)]
    #[test_case("Total (3 months) $597.00", Some(597.0) ; "count before the dollar amount")]
    #[test_case("149.50", Some(149.5) ; "no dollar sign")]
    fn test_parse_price(text: &str, expected: Option<f64>) {
        assert_eq!(parse_price(text), expected);
    }

    #[test]
    fn test_card_debug_masks_number() {
        let card = PaymentCard::stripe_test();
        let debug = format!("{:?}", card);
        assert!(debug.contains("**** 4242"));
        assert!(!debug.contains("4242424242424242"));
    }

    #[test]
    fn test_card_from_parts() {
        let card = PaymentCard::from_parts(
            Some("4000 0566 5566 5556".into()),
            Some("10/29".into()),
            Some("321".into()),
            Some("10001".into()),
        )
        .unwrap();
        assert_eq!(card.number, "4000056655665556");
        assert_eq!(card.last4(), "5556");
        assert!(PaymentCard::from_parts(Some("4242".into()), None, None, None).is_none());
    }
}
