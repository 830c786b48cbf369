//! Admin and patient login

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use lumimeds_common::config::PATIENT_LOGIN_PATH;
use lumimeds_common::Credentials;

use crate::context::TestContext;
use crate::error::{E2eError, E2eResult};

const EMAIL: &[&str] = &[
    r#"input[type="email"]"#,
    r#"input[name="email"]"#,
    "#email",
];
const PASSWORD: &[&str] = &[
    r#"input[type="password"]"#,
    r#"input[name="password"]"#,
    "#password",
];
const SUBMIT: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"button:has-text("Log in")"#,
    r#"button:has-text("Sign in")"#,
    r#"button:has-text("Login")"#,
];
const ERROR: &[&str] = &[r#"[role="alert"]"#, ".error-message", ".text-danger"];

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Who the browser is signed in as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Anonymous,
    Patient,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct LoginPage<'a> {
    ctx: &'a mut TestContext,
}

impl<'a> LoginPage<'a> {
    pub fn new(ctx: &'a mut TestContext) -> Self {
        Self { ctx }
    }

    fn target(&self, role: Role) -> E2eResult<Option<(String, Credentials)>> {
        let config = self.ctx.config();
        let (url, credentials, vars) = match role {
            Role::Anonymous => return Ok(None),
            Role::Admin => (config.admin_login_url.clone(), config.admin.clone(), "ADMIN_EMAIL/ADMIN_PASSWORD"),
            Role::Patient => (
                config.url(PATIENT_LOGIN_PATH),
                config.patient.clone(),
                "PATIENT_EMAIL/PATIENT_PASSWORD",
            ),
        };
        let credentials = credentials.ok_or_else(|| E2eError::Skipped(format!("{} not set", vars)))?;
        Ok(Some((url, credentials)))
    }

    /// Sign in as `role`. Anonymous is a no-op. Returns the URL landed on.
    pub async fn login(&mut self, role: Role) -> E2eResult<String> {
        let Some((url, credentials)) = self.target(role)? else {
            return self.ctx.session.current_url().await;
        };

        self.ctx.session.goto(&url).await?;
        self.ctx.log(format!("ℹ️ Logging in as {} at {}", role, url));

        if self.ctx.session.fill_first(EMAIL, &credentials.email).await?.is_none() {
            return Err(E2eError::step(format!("{} login", role), "email field not found"));
        }
        if self.ctx.session.fill_first(PASSWORD, &credentials.password).await?.is_none() {
            return Err(E2eError::step(format!("{} login", role), "password field not found"));
        }
        if self.ctx.session.click_first(SUBMIT).await?.is_none() {
            return Err(E2eError::step(format!("{} login", role), "submit button not found"));
        }

        let landed = self.wait_until_left("/login").await?;
        match landed {
            Some(url) => {
                self.ctx.log(format!("✓ Logged in as {} ({})", role, url));
                Ok(url)
            }
            None => {
                let message = match self.ctx.session.first_visible(ERROR).await? {
                    Some(selector) => self.ctx.session.text(&selector).await?.unwrap_or_default(),
                    None => String::new(),
                };
                self.ctx.log(format!("✗ {} login did not leave the login page", role));
                Err(E2eError::step(
                    format!("{} login", role),
                    if message.is_empty() {
                        "still on the login page".to_string()
                    } else {
                        message
                    },
                ))
            }
        }
    }

    /// Poll until the URL no longer contains `fragment`
    async fn wait_until_left(&mut self, fragment: &str) -> E2eResult<Option<String>> {
        let deadline = Instant::now() + self.ctx.session.timeouts().navigation;
        loop {
            let url = self.ctx.session.current_url().await?;
            if !url.contains(fragment) {
                return Ok(Some(url));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
