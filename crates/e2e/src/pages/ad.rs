//! Generic ad landing page driven by catalog data

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::catalog::PageDefinition;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::pages::popup::{close_popup, PopupOutcome};
use crate::pages::LandingPage;
use crate::protocol::{ClickNavigation, Navigation, RawLink, WaitState};

/// Grace period for the secondary ready markers once the first one missed
const READY_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

pub struct AdPage<'a> {
    ctx: &'a mut TestContext,
    page: &'a PageDefinition,
}

impl<'a> AdPage<'a> {
    pub fn new(ctx: &'a mut TestContext, page: &'a PageDefinition) -> Self {
        Self { ctx, page }
    }

    pub fn definition(&self) -> &PageDefinition {
        self.page
    }

    pub fn url(&self) -> String {
        self.ctx.url(&self.page.path)
    }

    /// Load, wait for content, clear popups
    pub async fn open(&mut self) -> E2eResult<PopupOutcome> {
        self.load().await?;
        if !self.wait_for_page_load().await? {
            self.ctx
                .log(format!("ℹ️ No ready marker on {} yet, continuing", self.page.path));
        }
        self.dismiss_interstitial().await
    }

    /// First CTA candidate that is on screen, scrolling to it if needed
    pub async fn locate_cta(&mut self) -> E2eResult<String> {
        if let Some(selector) = self.ctx.session.first_visible(&self.page.template.cta).await? {
            return Ok(selector);
        }
        for selector in &self.page.template.cta {
            if self.ctx.session.scroll_into_view(selector).await?
                && self.ctx.session.is_visible(selector).await?
            {
                return Ok(selector.clone());
            }
        }
        Err(E2eError::step(
            format!("primary action on {}", self.page.path),
            format!("none of {} CTA selectors is visible", self.page.template.cta.len()),
        ))
    }

    /// Click the CTA without waiting for a destination
    pub async fn click_cta(&mut self) -> E2eResult<String> {
        let selector = self.locate_cta().await?;
        self.ctx.session.click(&selector).await?;
        self.ctx.log(format!("✓ Clicked {}", self.cta_label()));
        Ok(selector)
    }

    pub fn cta_label(&self) -> &'static str {
        if self.page.is_spanish() {
            "Comenzar"
        } else {
            "Get Started"
        }
    }
}

#[async_trait]
impl<'a> LandingPage for AdPage<'a> {
    fn path(&self) -> &str {
        &self.page.path
    }

    async fn load(&mut self) -> E2eResult<Navigation> {
        let url = self.url();
        let template = &self.page.template;
        let attempts = template.load_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let error = match self.ctx.session.goto(&url).await {
                Ok(nav) if nav.status.map_or(true, |s| s < 500) => {
                    self.ctx.log(format!(
                        "✓ Loaded {} ({})",
                        url,
                        nav.status.map(|s| s.to_string()).unwrap_or_else(|| "no status".into())
                    ));
                    return Ok(nav);
                }
                Ok(nav) => E2eError::step(format!("load {}", url), format!("HTTP {}", nav.status.unwrap_or(0))),
                Err(e) => e,
            };

            if attempt < attempts {
                self.ctx.log(format!(
                    "ℹ️ Load attempt {}/{} for {} failed: {}; retrying in {:?}",
                    attempt,
                    attempts,
                    self.page.path,
                    error,
                    template.retry_delay()
                ));
                tokio::time::sleep(template.retry_delay()).await;
            }
            last_error = Some(error);
        }

        self.ctx.log(format!("✗ Could not load {} after {} attempts", url, attempts));
        Err(last_error.unwrap_or_else(|| E2eError::step(format!("load {}", url), "no attempts made")))
    }

    async fn wait_for_page_load(&mut self) -> E2eResult<bool> {
        let mut timeout = self.ctx.session.timeouts().action;
        for selector in &self.page.template.ready {
            if self.ctx.session.wait_for(selector, WaitState::Visible, timeout).await? {
                return Ok(true);
            }
            timeout = READY_FALLBACK_TIMEOUT;
        }
        Ok(false)
    }

    async fn dismiss_interstitial(&mut self) -> E2eResult<PopupOutcome> {
        let template = &self.page.template;
        close_popup(self.ctx, &template.popup_close, &template.overlays).await
    }

    async fn primary_action(&mut self) -> E2eResult<ClickNavigation> {
        let selector = self.locate_cta().await?;
        let funnel = self.page.template.funnel_path.clone();
        let nav = self.ctx.session.click_and_wait_url(&selector, &funnel).await?;
        if nav.matched {
            self.ctx.log(format!("✓ {} led to {}", self.cta_label(), nav.url));
        } else {
            self.ctx.log(format!(
                "✗ {} did not reach {} (at {})",
                self.cta_label(),
                funnel,
                nav.url
            ));
        }
        Ok(nav)
    }

    async fn footer_links(&mut self) -> E2eResult<Vec<RawLink>> {
        let footer = self.page.template.footer.clone();
        if !self.ctx.session.scroll_into_view(&footer).await? {
            self.ctx.log(format!("ℹ️ Footer {} not found on {}", footer, self.page.path));
            return Ok(Vec::new());
        }
        let links = self.ctx.session.links(&footer).await?;
        self.ctx.log(format!("ℹ️ Found {} footer links", links.len()));
        Ok(links)
    }

    async fn scroll_to_trustpilot(&mut self) -> E2eResult<bool> {
        for selector in &self.page.template.trustpilot {
            if self.ctx.session.scroll_into_view(selector).await? {
                self.ctx.log("✓ Trustpilot widget in view");
                return Ok(true);
            }
        }
        self.ctx.log("ℹ️ Trustpilot widget not found");
        Ok(false)
    }

    async fn click_trustpilot_widget(&mut self) -> E2eResult<bool> {
        let Some(selector) = self.ctx.session.first_visible(&self.page.template.trustpilot).await? else {
            self.ctx.log("ℹ️ Trustpilot widget not visible, skipping click");
            return Ok(false);
        };
        let timeout = self.ctx.session.timeouts().action;
        let clicked = self.ctx.session.click_with(&selector, timeout, true).await;
        Ok(self.ctx.recover("Trustpilot widget click", clicked).is_some())
    }

    async fn screenshot(&mut self, label: &str) -> E2eResult<PathBuf> {
        let name = format!("{}-{}", self.page.key(), label);
        self.ctx.session.screenshot(&name, true).await
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
    const COMENZAR: &str = r#"button:has-text("Comenzar")"#;

    fn context(fake: &FakeBrowser) -> TestContext {
        TestContext::new(fake.session(), Arc::new(HarnessConfig::default()), "ad")
    }

    #[tokio::test]
    async fn test_holiday_page_cta_reaches_survey() {
        let catalog = Catalog::embedded().unwrap();
        let page = catalog.get("holiday-weight-goals").unwrap();

        let fake = FakeBrowser::new("about:blank");
        fake.show(&["main", GET_STARTED]).on_click_navigate(
            GET_STARTED,
            "https://staging.lumimeds.com/products/survey/weight_loss?utm_source=ad",
        );

        let mut ctx = context(&fake);
        let mut ad = AdPage::new(&mut ctx, page);
        assert_eq!(ad.open().await.unwrap(), PopupOutcome::NotPresent);
        let nav = ad.primary_action().await.unwrap();
        assert!(nav.matched);
        assert!(lumimeds_common::urls::path_contains(&nav.url, "/products/survey/weight_loss"));
        assert_eq!(
            fake.state().history[1],
            "https://staging.lumimeds.com/ad/holiday-weight-goals"
        );
    }

    #[tokio::test]
    async fn test_spanish_page_uses_comenzar() {
        let catalog = Catalog::embedded().unwrap();
        let page = catalog.get("es/ad/semaglutide").unwrap();

        let fake = FakeBrowser::new("about:blank");
        fake.show(&[GET_STARTED, COMENZAR]);
        let mut ctx = context(&fake);
        let mut ad = AdPage::new(&mut ctx, page);
        assert_eq!(ad.cta_label(), "Comenzar");
        assert_eq!(ad.locate_cta().await.unwrap(), COMENZAR);
    }

    #[tokio::test]
    async fn test_missing_cta_is_a_step_failure() {
        let catalog = Catalog::embedded().unwrap();
        let page = catalog.get("semaglutide").unwrap();
        let fake = FakeBrowser::new("about:blank");
        let mut ctx = context(&fake);
        let err = AdPage::new(&mut ctx, page).primary_action().await.unwrap_err();
        assert!(matches!(err, E2eError::StepFailed { .. }));
    }

    #[tokio::test]
    async fn test_load_retries_then_fails() {
        let yaml = include_str!("../../catalog/ad_pages.yaml").replace("retry_delay_ms: 2000", "retry_delay_ms: 0");
        let catalog = Catalog::from_yaml(&yaml).unwrap();
        let page = catalog.get("tirzepatide").unwrap();

        let fake = FakeBrowser::new("about:blank");
        let mut ctx = context(&fake);
        // fake pages always answer 200, so a load only fails at the transport
        ctx.session.close().await.unwrap();
        let err = AdPage::new(&mut ctx, page).load().await.unwrap_err();
        assert!(matches!(err, E2eError::BridgeClosed));
        let retries = ctx.output().iter().filter(|l| l.contains("retrying")).count();
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_trustpilot_best_effort() {
        let catalog = Catalog::embedded().unwrap();
        let page = catalog.get("reviews").unwrap();
        let fake = FakeBrowser::new("about:blank");
        let mut ctx = context(&fake);
        let mut ad = AdPage::new(&mut ctx, page);
        assert!(!ad.scroll_to_trustpilot().await.unwrap());
        assert!(!ad.click_trustpilot_widget().await.unwrap());

        fake.show(&[".trustpilot-widget"]);
        assert!(ad.scroll_to_trustpilot().await.unwrap());
        assert!(ad.click_trustpilot_widget().await.unwrap());
    }
}
