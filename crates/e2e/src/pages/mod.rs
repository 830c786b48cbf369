//! Page objects
//!
//! Landing pages are driven through the `LandingPage` capability trait; the
//! funnel pages (home, questionnaire, plans, checkout, login, dashboard) are
//! concrete types because there is only one of each.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::E2eResult;
use crate::protocol::{ClickNavigation, Navigation, RawLink};

pub mod ad;
pub mod checkout;
pub mod dashboard;
pub mod home;
pub mod login;
pub mod plans;
pub mod popup;
pub mod questionnaire;

pub use ad::AdPage;
pub use checkout::{CheckoutMode, CheckoutOutcome, CheckoutPage};
pub use dashboard::DashboardPage;
pub use home::HomePage;
pub use login::{LoginPage, Role};
pub use plans::PlanSelectionPage;
pub use popup::{close_popup, PopupOutcome};
pub use questionnaire::QuestionnairePage;

/// What every marketing landing page can do
#[async_trait]
pub trait LandingPage: Send {
    /// Site-relative path of the page
    fn path(&self) -> &str;

    /// Navigate to the page, retrying transient failures
    async fn load(&mut self) -> E2eResult<Navigation>;

    /// Whether the page rendered its main content
    async fn wait_for_page_load(&mut self) -> E2eResult<bool>;

    /// Get any promotional popup out of the way
    async fn dismiss_interstitial(&mut self) -> E2eResult<PopupOutcome>;

    /// Click the main call to action and wait for the funnel
    async fn primary_action(&mut self) -> E2eResult<ClickNavigation>;

    /// Anchors in the footer, hrefs absolute
    async fn footer_links(&mut self) -> E2eResult<Vec<RawLink>>;

    async fn scroll_to_trustpilot(&mut self) -> E2eResult<bool>;

    async fn click_trustpilot_widget(&mut self) -> E2eResult<bool>;

    async fn screenshot(&mut self, label: &str) -> E2eResult<PathBuf>;
}
