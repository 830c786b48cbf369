//! End-to-end purchase: home page, questionnaire, plan, checkout

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use lumimeds_common::{Address, Coupon, HarnessConfig, TestIdentity, Timeouts};

use crate::catalog::Catalog;
use crate::context::TestContext;
use crate::error::E2eResult;
use crate::pages::questionnaire::QuestionnaireAnswers;
use crate::pages::{CheckoutMode, CheckoutPage, DashboardPage, HomePage, PlanSelectionPage, QuestionnairePage};
use crate::scenarios::Scenario;

const EMAIL_LOCAL_PART: &str = "e2e";

pub struct CheckoutFlow {
    mode: CheckoutMode,
    catalog: Arc<Catalog>,
}

impl CheckoutFlow {
    pub fn new(mode: CheckoutMode, catalog: Arc<Catalog>) -> Self {
        Self { mode, catalog }
    }
}

#[async_trait]
impl Scenario for CheckoutFlow {
    fn group(&self) -> &'static str {
        "checkout"
    }

    fn file(&self) -> String {
        format!("checkout/{}.spec", self.mode)
    }

    fn title(&self) -> String {
        match self.mode {
            CheckoutMode::Test => "new patient completes checkout with a Stripe test card".to_string(),
            CheckoutMode::Live => "new patient completes a live checkout with a verified coupon".to_string(),
        }
    }

    fn timeout(&self, timeouts: &Timeouts) -> Duration {
        timeouts.sweep.min(timeouts.test * 3)
    }

    fn skip_reason(&self, config: &HarnessConfig) -> Option<String> {
        self.mode.card(config).err().map(|e| e.to_string())
    }

    async fn run(&self, ctx: &mut TestContext) -> E2eResult<()> {
        let card = self.mode.card(ctx.config())?;
        let coupon = ctx.config().coupon_code.clone().map(Coupon::new);
        let identity = TestIdentity::generate(EMAIL_LOCAL_PART, &ctx.config().email_domain);
        let address = Address::test_address();

        {
            let mut home = HomePage::new(ctx, self.catalog.defaults());
            home.open().await?;
            home.start_weight_loss().await?;
        }

        let answers = QuestionnaireAnswers::eligible(identity.clone(), &address);
        QuestionnairePage::new(ctx).complete(&answers).await?;
        PlanSelectionPage::new(ctx).select_plan(None).await?;

        let outcome = CheckoutPage::new(ctx)
            .complete_checkout(&identity, &address, &card, coupon.as_ref(), self.mode)
            .await?;
        ctx.log(format!("✓ Order placed for {} ({})", identity.email, outcome.final_url));

        let mut dashboard = DashboardPage::new(ctx);
        if dashboard.wait_until_ready().await? {
            if let Some(greeting) = dashboard.greeting().await? {
                ctx.log(format!("ℹ️ Dashboard greeting: {}", greeting));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::E2eError;
    use crate::protocol::{CompletionSignal, SignalSource};
    use crate::testing::FakeBrowser;
    use lumimeds_common::config::{TestEnv, PRODUCTION_URL};

    const GET_STARTED: &str = r#"button:has-text("Get Started")"#;
    const CONTINUE: &str = r#"button:has-text("Continue")"#;
    const SELECT_PLAN: &str = r#"button:has-text("Select Plan")"#;
    const STREET: &str = r#"input[name="address"]"#;
    const PAY: &str = r#"button[type="submit"]:has-text("Pay")"#;

    fn flow(mode: CheckoutMode) -> CheckoutFlow {
        CheckoutFlow::new(mode, Arc::new(Catalog::embedded().unwrap()))
    }

    #[tokio::test]
    async fn test_staging_purchase_end_to_end() {
        let fake = FakeBrowser::new("about:blank");
        fake.show(&[GET_STARTED, CONTINUE, SELECT_PLAN, STREET, PAY])
            .on_click_navigate(GET_STARTED, "https://staging.lumimeds.com/products/survey/weight_loss")
            .on_click_navigate(CONTINUE, "https://staging.lumimeds.com/products/glp-1/plans")
            .on_click_navigate(SELECT_PLAN, "https://staging.lumimeds.com/checkout?plan=semaglutide");
        fake.state().signal = Some(CompletionSignal {
            via: SignalSource::Navigation,
            detail: "https://staging.lumimeds.com/patient/dashboard".into(),
        });

        let scenario = flow(CheckoutMode::Test);
        let config = Arc::new(HarnessConfig::default());
        assert_eq!(scenario.skip_reason(&config), None);

        let mut ctx = TestContext::new(fake.session(), config, "checkout");
        scenario.run(&mut ctx).await.unwrap();

        let email = ctx
            .output()
            .iter()
            .find_map(|l| l.strip_prefix("Email: "))
            .unwrap()
            .to_string();
        assert!(email.starts_with("e2e+") && email.ends_with("@lumimeds.com"));
        assert!(ctx.output().iter().any(|l| l.starts_with("✓ Order placed")));
        assert!(fake.state().fills.iter().any(|(_, v)| v == "4242424242424242"));
    }

    #[test]
    fn test_live_checkout_gating() {
        let live = flow(CheckoutMode::Live);
        let test = flow(CheckoutMode::Test);

        let mut config = HarnessConfig::default();
        assert!(live.skip_reason(&config).unwrap().contains("production"));
        assert_eq!(test.skip_reason(&config), None);

        config.env = TestEnv::Production;
        config.base_url = PRODUCTION_URL.to_string();
        assert!(test.skip_reason(&config).is_some());
        assert!(live.skip_reason(&config).unwrap().contains("ALLOW_LIVE_CHARGE"));

        config.allow_live_charge = true;
        assert!(live.skip_reason(&config).unwrap().contains("LIVE_CARD"));

        config.live_card = lumimeds_common::PaymentCard::from_parts(
            Some("5555555555554444".into()),
            Some("01/30".into()),
            Some("321".into()),
            Some("78701".into()),
        );
        assert_eq!(live.skip_reason(&config), None);
    }

    #[test]
    fn test_test_card_never_targets_production_host() {
        let test = flow(CheckoutMode::Test);
        let live = flow(CheckoutMode::Live);

        // BASE_URL points at production while TEST_ENV keeps its staging default
        let config = HarnessConfig {
            base_url: PRODUCTION_URL.to_string(),
            ..HarnessConfig::default()
        };
        assert!(test.skip_reason(&config).unwrap().contains("does not match base URL"));

        let config = HarnessConfig {
            base_url: "https://www.lumimeds.com".to_string(),
            env: TestEnv::Production,
            ..HarnessConfig::default()
        };
        assert!(test.skip_reason(&config).unwrap().contains("production"));

        // production label, staging host: no live card either
        let config = HarnessConfig {
            env: TestEnv::Production,
            allow_live_charge: true,
            live_card: lumimeds_common::PaymentCard::from_parts(
                Some("5555555555554444".into()),
                Some("01/30".into()),
                Some("321".into()),
                Some("78701".into()),
            ),
            ..HarnessConfig::default()
        };
        assert!(live.skip_reason(&config).is_some());
    }

    #[tokio::test]
    async fn test_mismatched_target_sends_nothing() {
        let fake = FakeBrowser::new("about:blank");
        let config = HarnessConfig {
            base_url: PRODUCTION_URL.to_string(),
            ..HarnessConfig::default()
        };
        let mut ctx = TestContext::new(fake.session(), Arc::new(config), "test card");
        assert!(flow(CheckoutMode::Test).run(&mut ctx).await.is_err());
        assert!(fake.commands().is_empty());
    }

    #[tokio::test]
    async fn test_live_run_refuses_without_opt_in() {
        let fake = FakeBrowser::new("about:blank");
        let config = HarnessConfig {
            env: TestEnv::Production,
            base_url: PRODUCTION_URL.to_string(),
            ..HarnessConfig::default()
        };
        let mut ctx = TestContext::new(fake.session(), Arc::new(config), "live");
        let err = flow(CheckoutMode::Live).run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, E2eError::Skipped(_)));
        assert!(fake.commands().is_empty());
    }

    #[test]
    fn test_timeout_is_bounded_by_sweep() {
        let timeouts = Timeouts::default();
        assert_eq!(flow(CheckoutMode::Test).timeout(&timeouts), Duration::from_secs(360));
    }
}
