//! Test scenarios
//!
//! A scenario is one test title. The runner pairs every scenario with every
//! selected browser project and gives each pair its own browser.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use lumimeds_common::{HarnessConfig, Timeouts};

use crate::catalog::Catalog;
use crate::context::TestContext;
use crate::error::E2eResult;
use crate::pages::{CheckoutMode, Role};

pub mod ad_pages;
pub mod admin_modal;
pub mod checkout;
pub mod footer;

pub use ad_pages::{CtaNavigation, LandingSmoke};
pub use admin_modal::ModalGating;
pub use checkout::CheckoutFlow;
pub use footer::FooterLinks;

#[async_trait]
pub trait Scenario: Send + Sync {
    /// Feature group, e.g. `ad-pages`
    fn group(&self) -> &'static str;

    /// Report file the scenario is filed under
    fn file(&self) -> String;

    fn title(&self) -> String;

    fn timeout(&self, timeouts: &Timeouts) -> Duration {
        timeouts.test
    }

    /// Reason to skip without launching a browser
    fn skip_reason(&self, _config: &HarnessConfig) -> Option<String> {
        None
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()>;
}

/// Whether `filter` (a group name or part of a file path) selects the scenario
pub fn matches_file(scenario: &dyn Scenario, filter: &str) -> bool {
    let filter = filter.trim().trim_end_matches(".spec.ts").trim_end_matches(".spec");
    filter.is_empty() || scenario.group() == filter || scenario.file().contains(filter)
}

/// Every scenario the suite knows about, in report order
pub fn registry(catalog: Arc<Catalog>) -> Vec<Arc<dyn Scenario>> {
    let mut scenarios: Vec<Arc<dyn Scenario>> = Vec::new();

    for page in catalog.pages() {
        scenarios.push(Arc::new(CtaNavigation::new(page.clone())));
        scenarios.push(Arc::new(LandingSmoke::new(page.clone())));
    }
    for page in catalog.pages() {
        scenarios.push(Arc::new(FooterLinks::new(page.clone())));
    }
    for role in [Role::Anonymous, Role::Patient, Role::Admin] {
        scenarios.push(Arc::new(ModalGating::new(role, catalog.pages().to_vec())));
    }
    for mode in [CheckoutMode::Test, CheckoutMode::Live] {
        scenarios.push(Arc::new(CheckoutFlow::new(mode, catalog.clone())));
    }

    scenarios
}
