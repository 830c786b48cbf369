//! Landing page scenarios: CTA into the funnel, and a rendering smoke test

use async_trait::async_trait;

use lumimeds_common::urls;

use crate::catalog::PageDefinition;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::pages::{AdPage, LandingPage, PopupOutcome};
use crate::scenarios::Scenario;

/// Clicking the primary CTA lands in the onboarding funnel
pub struct CtaNavigation {
    page: PageDefinition,
}

impl CtaNavigation {
    pub fn new(page: PageDefinition) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Scenario for CtaNavigation {
    fn group(&self) -> &'static str {
        "ad-pages"
    }

    fn file(&self) -> String {
        format!("ad-pages/{}.spec", self.page.key())
    }

    fn title(&self) -> String {
        let cta = if self.page.is_spanish() { "Comenzar" } else { "Get Started" };
        format!("{} {} navigates to {}", self.page.key(), cta, self.page.template.funnel_path)
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
        let mut ad = AdPage::new(ctx, &self.page);
        let popup = ad.open().await?;
        if !popup.is_clear() {
            ad.screenshot("popup-still-visible").await?;
        }

        let nav = ad.primary_action().await?;
        let funnel = &self.page.template.funnel_path;
        if nav.matched && urls::path_contains(&nav.url, funnel) {
            return Ok(());
        }

        let shot = ad.screenshot("cta-failed").await?;
        Err(E2eError::assertion(format!(
            "expected URL containing {} after clicking the CTA, got {} (screenshot {})",
            funnel,
            nav.url,
            shot.display()
        )))
    }
}

/// Page renders, popup dismissal is idempotent, Trustpilot is reachable
pub struct LandingSmoke {
    page: PageDefinition,
}

impl LandingSmoke {
    pub fn new(page: PageDefinition) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Scenario for LandingSmoke {
    fn group(&self) -> &'static str {
        "ad-pages"
    }

    fn file(&self) -> String {
        format!("ad-pages/{}.spec", self.page.key())
    }

    fn title(&self) -> String {
        format!("{} renders and dismisses popups", self.page.key())
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
        let mut ad = AdPage::new(ctx, &self.page);
        ad.load().await?;
        if !ad.wait_for_page_load().await? {
            let shot = ad.screenshot("not-rendered").await?;
            return Err(E2eError::assertion(format!(
                "{} never showed its main content (screenshot {})",
                self.page.path,
                shot.display()
            )));
        }

        let first = ad.dismiss_interstitial().await?;
        if first.is_clear() {
            let second = ad.dismiss_interstitial().await?;
            if second != PopupOutcome::NotPresent {
                return Err(E2eError::assertion(format!(
                    "popup dismissal not idempotent: first {:?}, then {:?}",
                    first, second
                )));
            }
        }

        if !self.page.template.trustpilot.is_empty() && ad.scroll_to_trustpilot().await? {
            ad.click_trustpilot_widget().await?;
        }
        ad.screenshot("smoke").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::testing::FakeBrowser;
    use lumimeds_common::HarnessConfig;
    use std::sync::Arc;

    const GET_STARTED: &str = r#"button:has-text("Get Started")"#;

    fn context(fake: &FakeBrowser) -> TestContext {
        let project = lumimeds_common::Project::by_name("mobile-safari").unwrap();
        assert_eq!(project.viewport, lumimeds_common::Viewport::IPHONE_PRO_MAX);
        TestContext::new(
            fake.session_with(project, &HarnessConfig::default()),
            Arc::new(HarnessConfig::default()),
            "scenario",
        )
    }

    #[tokio::test]
    async fn test_holiday_weight_goals_on_mobile() {
        let catalog = Catalog::embedded().unwrap();
        let scenario = CtaNavigation::new(catalog.get("holiday-weight-goals").unwrap().clone());
        assert_eq!(
            scenario.title(),
            "ad/holiday-weight-goals Get Started navigates to /products/survey/weight_loss"
        );

        let fake = FakeBrowser::new("about:blank");
        fake.show(&["main", GET_STARTED, r#"[aria-label="Close"]"#]);
        {
            let mut state = fake.state();
            state
                .hides
                .insert(r#"[aria-label="Close"]"#.into(), vec![r#"[aria-label="Close"]"#.into()]);
            state.navigations.insert(
                GET_STARTED.into(),
                "https://staging.lumimeds.com/products/survey/weight_loss?step=1".into(),
            );
        }

        let mut ctx = context(&fake);
        scenario.run(&mut ctx).await.unwrap();
        assert!(ctx.output().iter().any(|l| l.starts_with("✓ Closed popup")));
    }

    #[tokio::test]
    async fn test_cta_to_wrong_place_fails() {
        let catalog = Catalog::embedded().unwrap();
        let scenario = CtaNavigation::new(catalog.get("semaglutide").unwrap().clone());
        let fake = FakeBrowser::new("about:blank");
        fake.show(&["main", GET_STARTED])
            .on_click_navigate(GET_STARTED, "https://staging.lumimeds.com/products/glp-1/plans");

        let mut ctx = context(&fake);
        let err = scenario.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)));
        assert!(fake.commands().contains(&"screenshot".to_string()));
    }

    #[tokio::test]
    async fn test_smoke_is_idempotent_without_popup() {
        let catalog = Catalog::embedded().unwrap();
        let scenario = LandingSmoke::new(catalog.get("reviews").unwrap().clone());
        let fake = FakeBrowser::new("about:blank");
        fake.show(&["main", ".trustpilot-widget"]);

        let mut ctx = context(&fake);
        scenario.run(&mut ctx).await.unwrap();
        assert!(!fake.commands().contains(&"press".to_string()));
    }
}
