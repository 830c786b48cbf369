//! Site home page, the entry point of the checkout funnel

use lumimeds_common::config::WEIGHT_LOSS_SURVEY_PATH;

use crate::catalog::PageTemplate;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::pages::popup::{close_popup, PopupOutcome};

pub struct HomePage<'a> {
    ctx: &'a mut TestContext,
    selectors: &'a PageTemplate,
}

impl<'a> HomePage<'a> {
    /// `selectors` are the site-wide catalog defaults
    pub fn new(ctx: &'a mut TestContext, selectors: &'a PageTemplate) -> Self {
        Self { ctx, selectors }
    }

    pub async fn open(&mut self) -> E2eResult<PopupOutcome> {
        let url = self.ctx.url("/");
        self.ctx.session.goto(&url).await?;
        self.ctx.log(format!("✓ Opened {}", url));
        close_popup(self.ctx, &self.selectors.popup_close, &self.selectors.overlays).await
    }

    /// Click into the weight-loss questionnaire. Returns the URL reached.
    pub async fn start_weight_loss(&mut self) -> E2eResult<String> {
        let Some(cta) = self.ctx.session.first_visible(&self.selectors.cta).await? else {
            return Err(E2eError::step("start questionnaire", "no Get Started button on the home page"));
        };
        let nav = self.ctx.session.click_and_wait_url(&cta, WEIGHT_LOSS_SURVEY_PATH).await?;
        if !nav.matched {
            return Err(E2eError::step(
                "start questionnaire",
                format!("expected {} but landed on {}", WEIGHT_LOSS_SURVEY_PATH, nav.url),
            ));
        }
        self.ctx.log(format!("✓ Questionnaire started at {}", nav.url));
        Ok(nav.url)
    }
}
