//! Harness configuration: target environment, browser projects and timeouts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fixtures::PaymentCard;

pub const PRODUCTION_URL: &str = "https://lumimeds.com";
pub const STAGING_URL: &str = "https://staging.lumimeds.com";
pub const PRODUCTION_HOSTS: &[&str] = &["lumimeds.com", "www.lumimeds.com"];

/// Funnel entry reached from every landing page CTA
pub const WEIGHT_LOSS_SURVEY_PATH: &str = "/products/survey/weight_loss";
pub const PLANS_PATH: &str = "/products/glp-1/plans";
pub const ADMIN_LOGIN_PATH: &str = "/admin/login";
pub const PATIENT_LOGIN_PATH: &str = "/patient/login";

/// Which deployment the suite is pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestEnv {
    Production,
    #[default]
    Staging,
    /// Amplify preview host, taken from `TEST_URL`
    Preview,
}

impl TestEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestEnv::Production => "production",
            TestEnv::Staging => "staging",
            TestEnv::Preview => "preview",
        }
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            TestEnv::Production => Some(PRODUCTION_URL),
            TestEnv::Staging => Some(STAGING_URL),
            TestEnv::Preview => None,
        }
    }
}

impl FromStr for TestEnv {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(TestEnv::Production),
            "staging" | "stage" => Ok(TestEnv::Staging),
            "preview" | "amplify" => Ok(TestEnv::Preview),
            other => Err(Error::InvalidConfig(format!("unknown TEST_ENV '{}'", other))),
        }
    }
}

impl fmt::Display for TestEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the base URL: an explicit `BASE_URL` wins, then the environment default,
/// then `TEST_URL` for preview deployments.
pub fn resolve_base_url(env: TestEnv, base_url: Option<&str>, test_url: Option<&str>) -> Result<String> {
    let chosen = base_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| env.default_base_url())
        .or(test_url.filter(|u| !u.trim().is_empty()))
        .ok_or_else(|| {
            Error::InvalidConfig(format!("no base URL for {} (set BASE_URL or TEST_URL)", env))
        })?;

    let parsed = url::Url::parse(chosen).map_err(|e| Error::InvalidUrl {
        url: chosen.to_string(),
        reason: e.to_string(),
    })?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Whether a URL points at the live site
pub fn is_production_host(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .is_some_and(|host| PRODUCTION_HOSTS.contains(&host.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const DESKTOP: Viewport = Viewport { width: 1280, height: 720 };
    pub const IPHONE_PRO_MAX: Viewport = Viewport { width: 430, height: 932 };
    pub const PIXEL: Viewport = Viewport { width: 412, height: 915 };
}

impl FromStr for Viewport {
    type Err = Error;

    /// Accepts `430x932`, `430X932` or `430,932`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("invalid viewport '{}', expected WIDTHxHEIGHT", s));
        let (w, h) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X' || c == ',')
            .ok_or_else(invalid)?;
        let width = w.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = h.trim().parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Viewport { width, height })
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

/// A browser/device combination the suite runs against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub browser: BrowserKind,
    pub viewport: Viewport,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub has_touch: bool,
    #[serde(default = "default_scale")]
    pub device_scale_factor: f32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_scale() -> f32 {
    1.0
}

impl Project {
    fn desktop(name: &str, browser: BrowserKind) -> Self {
        Self {
            name: name.to_string(),
            browser,
            viewport: Viewport::DESKTOP,
            is_mobile: false,
            has_touch: false,
            device_scale_factor: 1.0,
            user_agent: None,
        }
    }

    /// The full device matrix
    pub fn all() -> Vec<Project> {
        vec![
            Project::desktop("chromium", BrowserKind::Chromium),
            Project::desktop("firefox", BrowserKind::Firefox),
            Project::desktop("webkit", BrowserKind::Webkit),
            Project {
                name: "mobile-safari".to_string(),
                browser: BrowserKind::Webkit,
                viewport: Viewport::IPHONE_PRO_MAX,
                is_mobile: true,
                has_touch: true,
                device_scale_factor: 3.0,
                user_agent: Some(
                    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                     (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1"
                        .to_string(),
                ),
            },
            Project {
                name: "mobile-chrome".to_string(),
                browser: BrowserKind::Chromium,
                viewport: Viewport::PIXEL,
                is_mobile: true,
                has_touch: true,
                device_scale_factor: 2.625,
                user_agent: Some(
                    "Mozilla/5.0 (Linux; Android 14; Pixel 7) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36"
                        .to_string(),
                ),
            },
            // Firefox has no isMobile support, so only the viewport is emulated
            Project {
                name: "mobile-firefox".to_string(),
                browser: BrowserKind::Firefox,
                viewport: Viewport::IPHONE_PRO_MAX,
                is_mobile: false,
                has_touch: false,
                device_scale_factor: 1.0,
                user_agent: None,
            },
        ]
    }

    pub fn by_name(name: &str) -> Option<Project> {
        let wanted = name.trim().to_ascii_lowercase();
        Project::all().into_iter().find(|p| p.name == wanted)
    }

    /// Resolve `TEST_BROWSER`/`TEST_VIEWPORT` into the projects to run.
    /// `all` (or nothing) selects the whole matrix.
    pub fn select(browser: Option<&str>, viewport: Option<Viewport>) -> Result<Vec<Project>> {
        let mut projects = match browser.map(str::trim).filter(|b| !b.is_empty()) {
            None | Some("all") => Project::all(),
            Some(name) => vec![Project::by_name(name)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown browser project '{}'", name)))?],
        };
        if let Some(viewport) = viewport {
            for project in &mut projects {
                project.viewport = viewport;
            }
        }
        Ok(projects)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub test: Duration,
    pub action: Duration,
    pub navigation: Duration,
    /// Budget for scenarios that walk every landing page in one test
    pub sweep: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            test: Duration::from_secs(120),
            action: Duration::from_secs(30),
            navigation: Duration::from_secs(60),
            sweep: Duration::from_secs(15 * 60),
        }
    }
}

/// Runner retries: 2 on CI, none locally
pub fn default_retries(ci: bool) -> u32 {
    if ci {
        2
    } else {
        0
    }
}

/// Login credentials. The password never appears in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn from_parts(email: Option<String>, password: Option<String>) -> Option<Self> {
        match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(Self { email, password })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything a scenario needs to know about where and how to run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub env: TestEnv,
    pub base_url: String,
    pub admin_login_url: String,
    pub admin: Option<Credentials>,
    pub patient: Option<Credentials>,
    pub timeouts: Timeouts,
    pub retries: u32,
    pub record_video: bool,
    pub headless: bool,
    /// Production checkout charges a real card; must be switched on explicitly
    pub allow_live_charge: bool,
    pub live_card: Option<PaymentCard>,
    pub coupon_code: Option<String>,
    pub email_domain: String,
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            env: TestEnv::Staging,
            base_url: STAGING_URL.to_string(),
            admin_login_url: format!("{}{}", STAGING_URL, ADMIN_LOGIN_PATH),
            admin: None,
            patient: None,
            timeouts: Timeouts::default(),
            retries: 0,
            record_video: false,
            headless: true,
            allow_live_charge: false,
            live_card: None,
            coupon_code: None,
            email_domain: "lumimeds.com".to_string(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Absolute URL for a site path
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Decided by the host actually under test, not the `TEST_ENV` label
    pub fn is_production(&self) -> bool {
        is_production_host(&self.base_url)
    }

    /// `TEST_ENV` and the base URL must agree on whether this is production.
    pub fn check_target(&self) -> Result<()> {
        let host_is_production = self.is_production();
        if host_is_production != (self.env == TestEnv::Production) {
            return Err(Error::InvalidConfig(format!(
                "TEST_ENV={} does not match base URL {} ({} host)",
                self.env,
                self.base_url,
                if host_is_production { "production" } else { "non-production" }
            )));
        }
        Ok(())
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.output_dir.join("videos")
    }
}

/// Interpret the usual truthy spellings of a boolean env var
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
