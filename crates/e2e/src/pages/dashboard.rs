//! Signed-in landing area for admins and patients

use std::time::Duration;

use crate::context::TestContext;
use crate::error::E2eResult;
use crate::protocol::WaitState;

const MARKERS: &[&str] = &[
    r#"[data-testid="dashboard"]"#,
    r#"nav:has-text("Dashboard")"#,
    r#"h1:has-text("Welcome")"#,
    r#"a:has-text("My Account")"#,
];
const HEADING: &str = "h1";
const LOGOUT: &[&str] = &[
    r#"button:has-text("Log out")"#,
    r#"a:has-text("Log out")"#,
    r#"button:has-text("Logout")"#,
];

pub struct DashboardPage<'a> {
    ctx: &'a mut TestContext,
}

impl<'a> DashboardPage<'a> {
    pub fn new(ctx: &'a mut TestContext) -> Self {
        Self { ctx }
    }

    /// Whether any dashboard marker shows up within the action timeout
    pub async fn wait_until_ready(&mut self) -> E2eResult<bool> {
        let per_marker = self.ctx.session.timeouts().action / MARKERS.len() as u32;
        for marker in MARKERS {
            if self.ctx.session.wait_for(marker, WaitState::Visible, per_marker).await? {
                self.ctx.log("✓ Dashboard loaded");
                return Ok(true);
            }
        }
        let url = self.ctx.session.current_url().await?;
        let ready = url.contains("/dashboard");
        if !ready {
            self.ctx.log(format!("ℹ️ No dashboard marker found at {}", url));
        }
        Ok(ready)
    }

    pub async fn greeting(&mut self) -> E2eResult<Option<String>> {
        Ok(self
            .ctx
            .session
            .text(HEADING)
            .await?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    /// Best effort; returns whether a logout control was clicked
    pub async fn log_out(&mut self) -> E2eResult<bool> {
        let clicked = self.ctx.session.click_first(LOGOUT).await;
        let clicked = self.ctx.recover("Logout", clicked).flatten().is_some();
        if clicked {
            self.ctx.session.sleep(Duration::from_millis(500)).await?;
            self.ctx.log("✓ Logged out");
        }
        Ok(clicked)
    }
}
