//! GLP-1 plan selection

use lumimeds_common::config::PLANS_PATH;

use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::protocol::WaitState;

pub const CHECKOUT_PATH: &str = "/checkout";

const PLAN_CARD: &str = r#"[data-testid="plan-card"]"#;
const SELECT_BUTTONS: &[&str] = &[
    r#"button:has-text("Select Plan")"#,
    r#"button:has-text("Choose Plan")"#,
    r#"button:has-text("Get Started")"#,
    r#"button:has-text("Seleccionar")"#,
    r#"a:has-text("Select Plan")"#,
];

pub struct PlanSelectionPage<'a> {
    ctx: &'a mut TestContext,
}

impl<'a> PlanSelectionPage<'a> {
    pub fn new(ctx: &'a mut TestContext) -> Self {
        Self { ctx }
    }

    /// Make sure the browser is on the plans page, navigating there if needed
    pub async fn ensure_loaded(&mut self) -> E2eResult<()> {
        let url = self.ctx.session.current_url().await?;
        if !url.contains(PLANS_PATH) {
            let target = self.ctx.url(PLANS_PATH);
            self.ctx.log(format!("ℹ️ Not on plans page ({}), opening {}", url, target));
            self.ctx.session.goto(&target).await?;
        }
        let timeout = self.ctx.session.timeouts().action;
        if !self.ctx.session.wait_for(PLAN_CARD, WaitState::Visible, timeout).await? {
            self.ctx.log("ℹ️ No plan cards marked up, falling back to select buttons");
        }
        Ok(())
    }

    /// Plan names as shown on the cards
    pub async fn plan_names(&mut self) -> E2eResult<Vec<String>> {
        let texts = self.ctx.session.texts(&format!("{} h3", PLAN_CARD)).await?;
        Ok(texts.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
    }

    /// Pick `preferred` if offered, else the first plan, and continue to checkout.
    /// Returns the checkout URL.
    pub async fn select_plan(&mut self, preferred: Option<&str>) -> E2eResult<String> {
        self.ensure_loaded().await?;

        let mut candidates: Vec<String> = Vec::new();
        if let Some(name) = preferred {
            for button in SELECT_BUTTONS {
                candidates.push(format!("{}:has-text(\"{}\") {}", PLAN_CARD, name, button));
            }
        }
        candidates.extend(SELECT_BUTTONS.iter().map(|s| s.to_string()));

        let Some(button) = self.ctx.session.first_visible(&candidates).await? else {
            let path = self.ctx.capture("no-plan-button").await?;
            return Err(E2eError::step(
                "plan selection",
                format!("no select button visible, see {}", path.display()),
            ));
        };

        let nav = self.ctx.session.click_and_wait_url(&button, CHECKOUT_PATH).await?;
        if !nav.matched {
            return Err(E2eError::step(
                "plan selection",
                format!("expected {} but landed on {}", CHECKOUT_PATH, nav.url),
            ));
        }
        self.ctx.log(format!("✓ Plan selected, checkout at {}", nav.url));
        Ok(nav.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBrowser;
    use lumimeds_common::HarnessConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_navigates_to_plans_then_checkout() {
        let fake = FakeBrowser::new("https://staging.lumimeds.com/products/survey/weight_loss");
        let preferred = format!("{}:has-text(\"Tirzepatide\") {}", PLAN_CARD, SELECT_BUTTONS[0]);
        fake.show(&[PLAN_CARD, SELECT_BUTTONS[0], preferred.as_str()])
            .on_click_navigate(&preferred, "https://staging.lumimeds.com/checkout?plan=tirzepatide");

        let mut ctx = TestContext::new(fake.session(), Arc::new(HarnessConfig::default()), "plans");
        let url = PlanSelectionPage::new(&mut ctx).select_plan(Some("Tirzepatide")).await.unwrap();
        assert!(url.contains("/checkout"));
        assert_eq!(
            fake.state().history[1],
            "https://staging.lumimeds.com/products/glp-1/plans"
        );
    }

    #[tokio::test]
    async fn test_missing_button_fails() {
        let fake = FakeBrowser::new("https://staging.lumimeds.com/products/glp-1/plans");
        let mut ctx = TestContext::new(fake.session(), Arc::new(HarnessConfig::default()), "plans");
        let err = PlanSelectionPage::new(&mut ctx).select_plan(None).await.unwrap_err();
        assert!(matches!(err, E2eError::StepFailed { .. }));
    }
}
