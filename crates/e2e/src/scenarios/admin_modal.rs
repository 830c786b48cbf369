//! Admin modal gating
//!
//! Anonymous visitors and patients go straight into the funnel from every
//! landing page. A signed-in admin gets a modal instead: dismissing it keeps
//! them on the page, proceeding sends them to patient login.

use async_trait::async_trait;
use std::time::Duration;

use lumimeds_common::{urls, HarnessConfig, Timeouts};

use crate::catalog::PageDefinition;
use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};
use crate::pages::{AdPage, LandingPage, LoginPage, Role};
use crate::protocol::WaitState;
use crate::scenarios::Scenario;

const PATIENT_LOGIN_INTENT: &str = "patient-login";

/// One role swept across every catalog page
pub struct ModalGating {
    role: Role,
    pages: Vec<PageDefinition>,
}

impl ModalGating {
    pub fn new(role: Role, pages: Vec<PageDefinition>) -> Self {
        Self { role, pages }
    }

    async fn check_funnel(&self, ctx: &mut TestContext, page: &PageDefinition) -> E2eResult<()> {
        let mut ad = AdPage::new(ctx, page);
        ad.open().await?;
        let nav = ad.primary_action().await?;
        if !urls::path_contains(&nav.url, &page.template.funnel_path) {
            return Err(E2eError::assertion(format!(
                "expected {} but got {}",
                page.template.funnel_path, nav.url
            )));
        }
        if ctx.session.first_visible(&page.template.admin_modal).await?.is_some() {
            return Err(E2eError::assertion("admin modal shown to a non-admin"));
        }
        Ok(())
    }

    /// Wait for any of the modal selectors, splitting the action timeout between them
    async fn wait_for_modal(ctx: &mut TestContext, page: &PageDefinition) -> E2eResult<Option<String>> {
        let selectors = &page.template.admin_modal;
        let share = ctx.session.timeouts().action / selectors.len().max(1) as u32;
        for selector in selectors {
            if ctx.session.wait_for(selector, WaitState::Visible, share).await? {
                return Ok(Some(selector.clone()));
            }
        }
        Ok(None)
    }

    async fn open_modal(ctx: &mut TestContext, page: &PageDefinition) -> E2eResult<String> {
        AdPage::new(ctx, page).click_cta().await?;
        Self::wait_for_modal(ctx, page)
            .await?
            .ok_or_else(|| E2eError::assertion("admin modal did not appear after the CTA"))
    }

    async fn check_admin_modal(&self, ctx: &mut TestContext, page: &PageDefinition) -> E2eResult<()> {
        AdPage::new(ctx, page).open().await?;
        let original = ctx.session.current_url().await?;

        // dismiss keeps the admin where they were
        let modal = Self::open_modal(ctx, page).await?;
        ctx.log(format!("✓ Admin modal visible ({})", modal));
        if ctx.session.click_first(&page.template.modal_dismiss).await?.is_none() {
            return Err(E2eError::assertion("admin modal has no dismiss action"));
        }
        let timeout = ctx.session.timeouts().action;
        if !ctx.session.wait_for(&modal, WaitState::Hidden, timeout).await? {
            return Err(E2eError::assertion("admin modal still open after dismiss"));
        }
        let after_dismiss = ctx.session.current_url().await?;
        if !urls::same_destination(&after_dismiss, &original) {
            return Err(E2eError::assertion(format!(
                "dismiss moved from {} to {}",
                original, after_dismiss
            )));
        }
        ctx.log("✓ Dismiss returned to the page");

        // proceed goes to patient login
        Self::open_modal(ctx, page).await?;
        if ctx.session.click_first(&page.template.modal_proceed).await?.is_none() {
            return Err(E2eError::assertion("admin modal has no proceed action"));
        }
        let navigation = ctx.session.timeouts().navigation;
        ctx.session.wait_for_url(PATIENT_LOGIN_INTENT, navigation).await?;
        let url = ctx.session.current_url().await?;
        if urls::query_param(&url, "intent").as_deref() != Some(PATIENT_LOGIN_INTENT) {
            return Err(E2eError::assertion(format!(
                "proceed led to {} without intent={}",
                url, PATIENT_LOGIN_INTENT
            )));
        }
        ctx.log(format!("✓ Proceed led to {}", url));
        Ok(())
    }
}

#[async_trait]
impl Scenario for ModalGating {
    fn group(&self) -> &'static str {
        "admin-modal"
    }

    fn file(&self) -> String {
        format!("admin-modal/{}.spec", self.role)
    }

    fn title(&self) -> String {
        match self.role {
            Role::Admin => "admin sees the modal on every ad page".to_string(),
            role => format!("{} goes straight to the funnel from every ad page", role),
        }
    }

    fn timeout(&self, timeouts: &Timeouts) -> Duration {
        timeouts.sweep
    }

    fn skip_reason(&self, config: &HarnessConfig) -> Option<String> {
        match self.role {
            Role::Admin if config.admin.is_none() => Some("ADMIN_EMAIL/ADMIN_PASSWORD not set".to_string()),
            Role::Patient if config.patient.is_none() => {
                Some("PATIENT_EMAIL/PATIENT_PASSWORD not set".to_string())
            }
            _ => None,
        }
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
        let mut failures = Vec::new();
        let mut signed_in = false;

        for page in &self.pages {
            if !signed_in {
                LoginPage::new(ctx).login(self.role).await?;
                signed_in = true;
            }

            let result = match self.role {
                Role::Admin => {
                    // proceeding hands the session over to patient login
                    signed_in = false;
                    self.check_admin_modal(ctx, page).await
                }
                _ => self.check_funnel(ctx, page).await,
            };

            match result {
                Ok(()) => ctx.log(format!("✓ {}", page.path)),
                Err(e @ (E2eError::BridgeClosed | E2eError::Skipped(_))) => return Err(e),
                Err(e) => {
                    ctx.log(format!("✗ {}: {}", page.path, e));
                    let shot = ctx.session.screenshot(&format!("{}-{}", self.role, page.key()), true).await;
                    ctx.recover("Failure screenshot", shot);
                    failures.push(format!("{}: {}", page.path, e));
                }
            }
        }

        ctx.log(format!(
            "ℹ️ {} of {} pages passed for {}",
            self.pages.len() - failures.len(),
            self.pages.len(),
            self.role
        ));
        if failures.is_empty() {
            Ok(())
        } else {
            Err(E2eError::assertion(failures.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::testing::FakeBrowser;
    use lumimeds_common::Credentials;
    use std::sync::Arc;

    const GET_STARTED: &str = r#"button:has-text("Get Started")"#;

    fn admin_config() -> HarnessConfig {
        HarnessConfig {
            admin: Credentials::from_parts(Some("qa-admin@lumimeds.com".into()), Some("secret".into())),
            ..HarnessConfig::default()
        }
    }

    #[tokio::test]
    async fn test_admin_dismiss_and_proceed() {
        let catalog = Catalog::embedded().unwrap();
        let page = catalog.get("holiday-weight-goals").unwrap().clone();
        let t = &page.template;
        let (modal, dismiss, proceed) = (&t.admin_modal[0], &t.modal_dismiss[0], &t.modal_proceed[0]);

        let fake = FakeBrowser::new("about:blank");
        fake.show(&[
            r#"input[type="email"]"#,
            r#"input[type="password"]"#,
            r#"button[type="submit"]"#,
            "main",
            GET_STARTED,
        ])
        .on_click_navigate(r#"button[type="submit"]"#, "https://staging.lumimeds.com/admin/dashboard");
        {
            let mut state = fake.state();
            state
                .reveals
                .insert(GET_STARTED.into(), vec![modal.clone(), dismiss.clone(), proceed.clone()]);
            state
                .hides
                .insert(dismiss.clone(), vec![modal.clone(), dismiss.clone(), proceed.clone()]);
            state.navigations.insert(
                proceed.clone(),
                "https://staging.lumimeds.com/patient/login?intent=patient-login".into(),
            );
        }

        let config = admin_config();
        let scenario = ModalGating::new(Role::Admin, vec![page.clone()]);
        assert_eq!(scenario.skip_reason(&config), None);

        let mut ctx = TestContext::new(fake.session(), Arc::new(config), "admin");
        scenario.run(&mut ctx).await.unwrap();
        assert!(ctx.output().iter().any(|l| l.starts_with("✓ Dismiss returned")));
        assert!(ctx.output().iter().any(|l| l.contains("intent=patient-login")));
    }

    #[tokio::test]
    async fn test_missing_modal_is_reported_per_page() {
        let catalog = Catalog::embedded().unwrap();
        let pages = vec![
            catalog.get("semaglutide").unwrap().clone(),
            catalog.get("tirzepatide").unwrap().clone(),
        ];
        let fake = FakeBrowser::new("about:blank");
        fake.show(&[
            r#"input[type="email"]"#,
            r#"input[type="password"]"#,
            r#"button[type="submit"]"#,
            "main",
            GET_STARTED,
        ])
        .on_click_navigate(r#"button[type="submit"]"#, "https://staging.lumimeds.com/admin/dashboard");

        let mut ctx = TestContext::new(fake.session(), Arc::new(admin_config()), "admin");
        let err = ModalGating::new(Role::Admin, pages).run(&mut ctx).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/ad/semaglutide"));
        assert!(message.contains("/ad/tirzepatide"));
    }

    #[test]
    fn test_skip_without_credentials() {
        let config = HarnessConfig::default();
        assert!(ModalGating::new(Role::Admin, vec![]).skip_reason(&config).is_some());
        assert!(ModalGating::new(Role::Patient, vec![]).skip_reason(&config).is_some());
        assert!(ModalGating::new(Role::Anonymous, vec![]).skip_reason(&config).is_none());
    }
}
