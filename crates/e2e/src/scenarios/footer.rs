//! Footer link integrity

use async_trait::async_trait;

use lumimeds_common::HarnessConfig;

use crate::catalog::PageDefinition;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::links::LinkChecker;
use crate::pages::{AdPage, LandingPage};
use crate::scenarios::Scenario;

/// Every declared footer link resolves to its expected destination
pub struct FooterLinks {
    page: PageDefinition,
}

impl FooterLinks {
    pub fn new(page: PageDefinition) -> Self {
        Self { page }
    }
}

#[async_trait]
impl Scenario for FooterLinks {
    fn group(&self) -> &'static str {
        "footer"
    }

    fn file(&self) -> String {
        format!("footer/{}.spec", self.page.key())
    }

    fn title(&self) -> String {
        format!("{} footer links resolve", self.page.key())
    }

    fn skip_reason(&self, _config: &HarnessConfig) -> Option<String> {
        self.page
            .template
            .footer_links
            .is_empty()
            .then(|| format!("{} declares no footer links", self.page.path))
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
        let checker = LinkChecker::new(ctx.config().base_url.clone(), ctx.config().timeouts.navigation)?;

        let found = {
            let mut ad = AdPage::new(ctx, &self.page);
            ad.open().await?;
            ad.footer_links().await?
        };

        let checks = checker.check(&self.page.template.footer_links, &found).await?;
        let mut failures = Vec::new();
        for check in &checks {
            ctx.log(check.describe());
            if !check.is_ok() {
                failures.push(check.describe());
            }
        }

        if failures.is_empty() {
            ctx.log(format!("✓ All {} footer links OK", checks.len()));
            return Ok(());
        }
        ctx.capture("footer").await?;
        Err(E2eError::assertion(format!(
            "{} of {} footer links failed:\n{}",
            failures.len(),
            checks.len(),
            failures.join("\n")
        )))
    }
}
