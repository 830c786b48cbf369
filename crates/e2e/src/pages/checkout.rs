//! Checkout: shipping, coupon verification, Stripe card entry and submission
//!
//! The coupon check is the one hard gate in the flow. The card is only typed
//! in once the discount shown matches what the coupon code promises, so a
//! misconfigured coupon can never turn into a full-price charge.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use lumimeds_common::fixtures::{discount_percent, discount_within_tolerance, parse_price};
use lumimeds_common::{Address, Coupon, HarnessConfig, PaymentCard, TestIdentity};

use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::pages::plans::CHECKOUT_PATH;
use crate::protocol::{CompletionSignal, SignalSource};

const CARD_FILL_ATTEMPTS: u32 = 3;
const PRICE_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

const FIRST_NAME: &[&str] = &[r#"input[name="firstName"]"#, r#"input[name="first_name"]"#];
const LAST_NAME: &[&str] = &[r#"input[name="lastName"]"#, r#"input[name="last_name"]"#];
const EMAIL: &[&str] = &[r#"input[type="email"]"#, r#"input[name="email"]"#];
const PHONE: &[&str] = &[r#"input[type="tel"]"#, r#"input[name="phone"]"#];
const STREET: &[&str] = &[
    r#"input[name="address"]"#,
    r#"input[name="addressLine1"]"#,
    r#"input[name="street"]"#,
];
const UNIT: &[&str] = &[r#"input[name="address2"]"#, r#"input[name="addressLine2"]"#];
const CITY: &[&str] = &[r#"input[name="city"]"#];
const STATE: &str = r#"select[name="state"]"#;
const ZIP: &[&str] = &[r#"input[name="zip"]"#, r#"input[name="zipCode"]"#, r#"input[name="postalCode"]"#];

const COUPON_INPUT: &[&str] = &[
    r#"input[name="coupon"]"#,
    r#"input[name="promoCode"]"#,
    r#"input[placeholder*="coupon" i]"#,
    r#"input[placeholder*="promo" i]"#,
];
const COUPON_APPLY: &[&str] = &[r#"button:has-text("Apply")"#, r#"button:has-text("Aplicar")"#];
const COUPON_REMOVE: &[&str] = &[
    r#"button:has-text("Remove")"#,
    r#"[aria-label="Remove coupon"]"#,
    r#"button:has-text("Eliminar")"#,
];
const TOTAL: &[&str] = &[
    r#"[data-testid="order-total"]"#,
    ".order-total",
    r#"[data-testid="total-price"]"#,
];

const STRIPE_FRAME: &str = r#"iframe[title="Secure payment input frame"]"#;
const TERMS: &str = r#"input[type="checkbox"][name="terms"]"#;
const SUBMIT: &[&str] = &[
    r#"button[type="submit"]:has-text("Pay")"#,
    r#"button:has-text("Complete Order")"#,
    r#"button:has-text("Place Order")"#,
    r#"button:has-text("Submit")"#,
];
const CONFIRMATION: &[&str] = &[
    r#"h1:has-text("Thank you")"#,
    r#"h1:has-text("Order Confirmed")"#,
    r#"h1:has-text("Welcome")"#,
    r#"[data-testid="order-confirmation"]"#,
];
const SUCCESS_MARKERS: &[&str] = &[
    r#""status":"succeeded""#,
    r#""paymentStatus":"paid""#,
    r#""orderConfirmed":true"#,
    "order_confirmed",
];

/// Which card the checkout is allowed to charge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// Stripe test card against staging
    Test,
    /// Configured real card against production
    Live,
}

impl CheckoutMode {
    pub fn for_config(config: &HarnessConfig) -> Self {
        if config.is_production() && config.check_target().is_ok() {
            CheckoutMode::Live
        } else {
            CheckoutMode::Test
        }
    }

    /// The card for this mode. The host under test decides which card may
    /// run; live also needs the opt-in flag and a configured card.
    pub fn card(&self, config: &HarnessConfig) -> E2eResult<PaymentCard> {
        config.check_target()?;
        match self {
            CheckoutMode::Test if config.is_production() => Err(E2eError::Skipped(
                "test card checkout does not run against production".to_string(),
            )),
            CheckoutMode::Test => Ok(PaymentCard::stripe_test()),
            CheckoutMode::Live if !config.is_production() => {
                Err(E2eError::Skipped("live checkout only runs against production".to_string()))
            }
            CheckoutMode::Live if !config.allow_live_charge => Err(E2eError::Skipped(
                "live checkout charges a real card; set ALLOW_LIVE_CHARGE=true to run it".to_string(),
            )),
            CheckoutMode::Live => config
                .live_card
                .clone()
                .ok_or_else(|| E2eError::Skipped("LIVE_CARD_* variables are not set".to_string())),
        }
    }
}

impl fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckoutMode::Test => write!(f, "test"),
            CheckoutMode::Live => write!(f, "live"),
        }
    }
}

/// What a completed checkout looked like
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutOutcome {
    pub signal: CompletionSignal,
    pub price_before: Option<f64>,
    pub price_after: Option<f64>,
    pub discount: Option<f64>,
    pub final_url: String,
}

/// Check the discount actually shown against what the coupon promises.
/// Returns the measured discount percentage when one could be computed.
pub fn verify_coupon(
    coupon: &Coupon,
    price_before: Option<f64>,
    price_after: Option<f64>,
    mode: CheckoutMode,
) -> E2eResult<Option<f64>> {
    let expected = coupon.expected_discount();
    let mismatch = |actual: String| E2eError::CouponMismatch {
        coupon: coupon.code.clone(),
        expected,
        actual,
    };

    let discount = match (price_before, price_after) {
        (Some(before), Some(after)) => discount_percent(before, after),
        _ => None,
    };

    match (expected, discount) {
        (None, _) if mode == CheckoutMode::Live => {
            Err(mismatch("no discount percentage can be read from the code".to_string()))
        }
        (None, discount) => Ok(discount),
        (Some(_), None) => Err(mismatch(format!(
            "price unavailable (before {:?}, after {:?})",
            price_before, price_after
        ))),
        (Some(expected), Some(actual)) if discount_within_tolerance(actual, expected) => Ok(Some(actual)),
        (Some(_), Some(actual)) => Err(mismatch(format!(
            "{:.1}% (${:.2} -> ${:.2})",
            actual,
            price_before.unwrap_or_default(),
            price_after.unwrap_or_default()
        ))),
    }
}

pub struct CheckoutPage<'a> {
    ctx: &'a mut TestContext,
}

impl<'a> CheckoutPage<'a> {
    pub fn new(ctx: &'a mut TestContext) -> Self {
        Self { ctx }
    }

    pub async fn fill_shipping(&mut self, identity: &TestIdentity, address: &Address) -> E2eResult<()> {
        let session = &mut self.ctx.session;
        session.fill_first(FIRST_NAME, &identity.first_name).await?;
        session.fill_first(LAST_NAME, &identity.last_name).await?;
        session.fill_first(EMAIL, &identity.email).await?;
        session.fill_first(PHONE, &identity.phone).await?;

        if session.fill_first(STREET, &address.street).await?.is_none() {
            return Err(E2eError::step("shipping address", "street field not found"));
        }
        if let Some(unit) = &address.unit {
            session.fill_first(UNIT, unit).await?;
        }
        session.fill_first(CITY, &address.city).await?;
        if session.is_visible(STATE).await? {
            session.select_option(STATE, &address.state).await?;
        }
        session.fill_first(ZIP, &address.zip).await?;

        self.ctx.log(format!("✓ Shipping address filled ({}, {})", address.city, address.state));
        Ok(())
    }

    /// Order total as displayed, if it can be read
    pub async fn read_total(&mut self) -> E2eResult<Option<f64>> {
        let Some(selector) = self.ctx.session.first_visible(TOTAL).await? else {
            return Ok(None);
        };
        Ok(self.ctx.session.text(&selector).await?.as_deref().and_then(parse_price))
    }

    async fn wait_for_total(&mut self, different_from: Option<f64>) -> E2eResult<Option<f64>> {
        let mut last = None;
        for _ in 0..PRICE_POLLS {
            last = self.read_total().await?;
            if last.is_some() && last != different_from {
                return Ok(last);
            }
            self.ctx.session.sleep(POLL_INTERVAL).await?;
        }
        Ok(last)
    }

    /// Remove a pre-applied coupon, if any
    pub async fn remove_coupon(&mut self) -> E2eResult<bool> {
        let removed = self.ctx.session.click_first(COUPON_REMOVE).await?.is_some();
        if removed {
            self.ctx.log("ℹ️ Removed pre-applied coupon");
            self.ctx.session.sleep(POLL_INTERVAL).await?;
        }
        Ok(removed)
    }

    pub async fn apply_coupon(&mut self, coupon: &Coupon) -> E2eResult<()> {
        self.ctx.log(format!("Coupon: {}", coupon.code));
        if self.ctx.session.fill_first(COUPON_INPUT, &coupon.code).await?.is_none() {
            return Err(E2eError::step("apply coupon", "coupon field not found"));
        }
        if self.ctx.session.click_first(COUPON_APPLY).await?.is_none() {
            self.ctx.session.press(Some(COUPON_INPUT[0]), "Enter").await?;
        }
        Ok(())
    }

    async fn fill_card_field(&mut self, name: &str, input: &str, value: &str) -> E2eResult<()> {
        let mut last_error = None;
        for attempt in 1..=CARD_FILL_ATTEMPTS {
            match self.ctx.session.frame_fill(STRIPE_FRAME, input, value).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.ctx.log(format!(
                        "ℹ️ Card {} fill attempt {}/{} failed: {}",
                        name, attempt, CARD_FILL_ATTEMPTS, e
                    ));
                    last_error = Some(e);
                    if attempt < CARD_FILL_ATTEMPTS {
                        self.ctx.session.sleep(POLL_INTERVAL).await?;
                    }
                }
            }
        }
        Err(E2eError::step(
            format!("card {}", name),
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }

    pub async fn fill_card(&mut self, card: &PaymentCard) -> E2eResult<()> {
        self.fill_card_field("number", r#"[name="number"]"#, &card.number).await?;
        self.fill_card_field("expiry", r#"[name="expiry"]"#, &card.expiry).await?;
        self.fill_card_field("cvc", r#"[name="cvc"]"#, &card.cvc).await?;
        // Stripe hides the postal code for some card countries
        let zip = self.fill_card_field("zip", r#"[name="postalCode"]"#, &card.zip).await;
        self.ctx.recover("Card postal code", zip);
        self.ctx.log(format!("✓ Card ending {} entered", card.last4()));
        Ok(())
    }

    /// Submit and wait for any completion signal. A timeout only counts as
    /// success if the page has clearly moved on.
    pub async fn submit(&mut self) -> E2eResult<CompletionSignal> {
        if self.ctx.session.is_visible(TERMS).await? {
            let checked = self.ctx.session.check(TERMS).await;
            self.ctx.recover("Terms checkbox", checked);
        }

        let Some(button) = self.ctx.session.first_visible(SUBMIT).await? else {
            return Err(E2eError::step("submit order", "no submit button visible"));
        };
        let markers: Vec<String> = SUCCESS_MARKERS.iter().map(|m| m.to_string()).collect();
        let timeout = self.ctx.session.timeouts().navigation;
        let signal = self
            .ctx
            .session
            .submit_and_watch(&button, CHECKOUT_PATH, &markers, timeout)
            .await?;

        if signal.via != SignalSource::Timeout {
            self.ctx.log(format!("✓ Checkout completed via {:?}: {}", signal.via, signal.detail));
            return Ok(signal);
        }

        let url = self.ctx.session.current_url().await?;
        let confirmation = self.ctx.session.first_visible(CONFIRMATION).await?;
        if !url.contains(CHECKOUT_PATH) || confirmation.is_some() {
            self.ctx.log(format!("✓ Checkout confirmed after timeout at {}", url));
            return Ok(signal);
        }

        let path = self.ctx.capture("checkout-no-confirmation").await?;
        Err(E2eError::step(
            "checkout completion",
            format!("no completion signal within {:?}, still at {} (see {})", timeout, url, path.display()),
        ))
    }

    pub async fn complete_checkout(
        &mut self,
        identity: &TestIdentity,
        address: &Address,
        card: &PaymentCard,
        coupon: Option<&Coupon>,
        mode: CheckoutMode,
    ) -> E2eResult<CheckoutOutcome> {
        match mode {
            CheckoutMode::Test if !card.is_stripe_test() => {
                return Err(E2eError::assertion("test checkout refuses to use a non-test card"));
            }
            CheckoutMode::Live => {
                self.ctx.log(format!("⚠️ LIVE CHECKOUT: card ending {} will be charged", card.last4()));
            }
            CheckoutMode::Test => {}
        }

        self.fill_shipping(identity, address).await?;

        self.remove_coupon().await?;
        let price_before = self.wait_for_total(None).await?;
        self.ctx.log(format!(
            "ℹ️ Price before coupon: {}",
            price_before.map(|p| format!("${:.2}", p)).unwrap_or_else(|| "unknown".into())
        ));

        let (price_after, discount) = match coupon {
            Some(coupon) => {
                self.apply_coupon(coupon).await?;
                let price_after = self.wait_for_total(price_before).await?;
                match verify_coupon(coupon, price_before, price_after, mode) {
                    Ok(discount) => {
                        if let Some(d) = discount {
                            self.ctx.log(format!("✓ Coupon {} discount {:.1}% verified", coupon.code, d));
                        }
                        (price_after, discount)
                    }
                    Err(e) => {
                        self.ctx.log(format!("✗ {}", e));
                        self.ctx.capture("coupon-mismatch").await?;
                        return Err(e);
                    }
                }
            }
            None if mode == CheckoutMode::Live => {
                return Err(E2eError::CouponMismatch {
                    coupon: "(none)".to_string(),
                    expected: None,
                    actual: "live checkout requires COUPON_CODE".to_string(),
                });
            }
            None => (price_before, None),
        };

        self.fill_card(card).await?;
        let signal = self.submit().await?;
        let final_url = self.ctx.session.current_url().await?;

        Ok(CheckoutOutcome {
            signal,
            price_before,
            price_after,
            discount,
            final_url,
        })
    }
}
