//! Bridge commands and the typed values they return

use serde::{Deserialize, Serialize};

use lumimeds_common::{BrowserKind, Viewport};

/// A single request to the Playwright bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    Launch {
        browser: BrowserKind,
        headless: bool,
        viewport: Viewport,
        is_mobile: bool,
        has_touch: bool,
        device_scale_factor: f32,
        user_agent: Option<String>,
        video_dir: Option<String>,
        action_timeout: u64,
        navigation_timeout: u64,
    },
    Goto {
        url: String,
        wait_until: WaitUntil,
    },
    Url,
    Click {
        selector: String,
        timeout: u64,
        force: bool,
    },
    /// Click while already waiting for the URL, so fast redirects are not missed
    ClickAndWaitUrl {
        selector: String,
        url_contains: String,
        timeout: u64,
    },
    Fill {
        selector: String,
        value: String,
        timeout: u64,
    },
    /// Fill a field inside an iframe, e.g. Stripe card elements
    FrameFill {
        frame_selector: String,
        selector: String,
        value: String,
        timeout: u64,
    },
    Press {
        selector: Option<String>,
        key: String,
    },
    WaitFor {
        selector: String,
        state: WaitState,
        timeout: u64,
    },
    WaitForUrl {
        contains: String,
        timeout: u64,
    },
    Visible {
        selector: String,
    },
    Count {
        selector: String,
    },
    Text {
        selector: String,
        timeout: u64,
    },
    Texts {
        selector: String,
    },
    Links {
        selector: String,
    },
    MouseClick {
        x: f64,
        y: f64,
    },
    ScrollIntoView {
        selector: String,
        timeout: u64,
    },
    Screenshot {
        path: String,
        full_page: bool,
    },
    Evaluate {
        script: String,
    },
    Sleep {
        ms: u64,
    },
    SelectOption {
        selector: String,
        value: String,
        timeout: u64,
    },
    Check {
        selector: String,
        timeout: u64,
    },
    /// Click submit and race every completion signal the checkout can give
    SubmitAndWatch {
        selector: String,
        checkout_path: String,
        markers: Vec<String>,
        timeout: u64,
    },
    GoBack,
    Viewport,
    ClearCookies,
    Close,
}

impl Command {
    /// Wire names, in declaration order
    pub const NAMES: [&'static str; 27] = [
        "launch",
        "goto",
        "url",
        "click",
        "click_and_wait_url",
        "fill",
        "frame_fill",
        "press",
        "wait_for",
        "wait_for_url",
        "visible",
        "count",
        "text",
        "texts",
        "links",
        "mouse_click",
        "scroll_into_view",
        "screenshot",
        "evaluate",
        "sleep",
        "select_option",
        "check",
        "submit_and_watch",
        "go_back",
        "viewport",
        "clear_cookies",
        "close",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Launch { .. } => "launch",
            Command::Goto { .. } => "goto",
            Command::Url => "url",
            Command::Click { .. } => "click",
            Command::ClickAndWaitUrl { .. } => "click_and_wait_url",
            Command::Fill { .. } => "fill",
            Command::FrameFill { .. } => "frame_fill",
            Command::Press { .. } => "press",
            Command::WaitFor { .. } => "wait_for",
            Command::WaitForUrl { .. } => "wait_for_url",
            Command::Visible { .. } => "visible",
            Command::Count { .. } => "count",
            Command::Text { .. } => "text",
            Command::Texts { .. } => "texts",
            Command::Links { .. } => "links",
            Command::MouseClick { .. } => "mouse_click",
            Command::ScrollIntoView { .. } => "scroll_into_view",
            Command::Screenshot { .. } => "screenshot",
            Command::Evaluate { .. } => "evaluate",
            Command::Sleep { .. } => "sleep",
            Command::SelectOption { .. } => "select_option",
            Command::Check { .. } => "check",
            Command::SubmitAndWatch { .. } => "submit_and_watch",
            Command::GoBack => "go_back",
            Command::Viewport => "viewport",
            Command::ClearCookies => "clear_cookies",
            Command::Close => "close",
        }
    }

    /// Short label for logs and errors. Never includes filled values.
    pub fn describe(&self) -> String {
        match self {
            Command::Launch { browser, .. } => format!("launch:{}", browser.as_str()),
            Command::Goto { url, .. } => format!("goto:{}", url),
            Command::Click { selector, .. } => format!("click:{}", selector),
            Command::ClickAndWaitUrl { selector, url_contains, .. } => {
                format!("click:{} -> {}", selector, url_contains)
            }
            Command::Fill { selector, .. } => format!("fill:{}", selector),
            Command::FrameFill { frame_selector, selector, .. } => {
                format!("fill:{} >> {}", frame_selector, selector)
            }
            Command::Press { key, .. } => format!("press:{}", key),
            Command::WaitFor { selector, .. } => format!("wait:{}", selector),
            Command::WaitForUrl { contains, .. } => format!("wait_url:{}", contains),
            Command::Visible { selector } => format!("visible:{}", selector),
            Command::Count { selector } => format!("count:{}", selector),
            Command::Text { selector, .. } | Command::Texts { selector } => format!("text:{}", selector),
            Command::Links { selector } => format!("links:{}", selector),
            Command::MouseClick { x, y } => format!("mouse_click:{},{}", x, y),
            Command::ScrollIntoView { selector, .. } => format!("scroll:{}", selector),
            Command::Screenshot { path, .. } => format!("screenshot:{}", path),
            Command::Evaluate { script } => {
                format!("evaluate:{}", script.chars().take(30).collect::<String>())
            }
            Command::Sleep { ms } => format!("sleep:{}ms", ms),
            Command::SelectOption { selector, .. } => format!("select:{}", selector),
            Command::Check { selector, .. } => format!("check:{}", selector),
            Command::SubmitAndWatch { selector, .. } => format!("submit:{}", selector),
            other => other.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
    Commit,
}

/// Result of `goto`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Navigation {
    pub status: Option<u16>,
    pub url: String,
}

/// Result of `click_and_wait_url`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClickNavigation {
    pub matched: bool,
    pub url: String,
}

/// An anchor as found in the DOM, `href` already absolute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub text: String,
    pub href: String,
}

/// Which checkout completion signal fired first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Navigation,
    Response,
    NewPage,
    Timeout,
}

/// Tagged result of the checkout completion race
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub via: SignalSource,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ClosedSession {
    #[serde(default)]
    pub video: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format_is_flat_and_camel_cased() {
        let cmd = Command::ClickAndWaitUrl {
            selector: "button:has-text(\"Get Started\")".into(),
            url_contains: "/products/survey/weight_loss".into(),
            timeout: 60000,
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({
                "cmd": "click_and_wait_url",
                "selector": "button:has-text(\"Get Started\")",
                "urlContains": "/products/survey/weight_loss",
                "timeout": 60000
            })
        );
        assert_eq!(serde_json::to_value(Command::Url).unwrap(), json!({ "cmd": "url" }));
    }

    #[test]
    fn test_launch_serializes_viewport() {
        let cmd = Command::Launch {
            browser: BrowserKind::Webkit,
            headless: true,
            viewport: Viewport::IPHONE_PRO_MAX,
            is_mobile: true,
            has_touch: true,
            device_scale_factor: 3.0,
            user_agent: None,
            video_dir: Some("test-results/videos".into()),
            action_timeout: 30000,
            navigation_timeout: 60000,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["browser"], "webkit");
        assert_eq!(value["viewport"], json!({ "width": 430, "height": 932 }));
        assert_eq!(value["isMobile"], true);
        assert_eq!(value["videoDir"], "test-results/videos");
    }

    #[test]
    fn test_names_match_serialized_tags() {
        let samples = vec![
            Command::Url,
            Command::GoBack,
            Command::Viewport,
            Command::ClearCookies,
            Command::Close,
            Command::Sleep { ms: 1 },
            Command::Visible { selector: "x".into() },
        ];
        for cmd in samples {
            let value = serde_json::to_value(&cmd).unwrap();
            assert_eq!(value["cmd"], cmd.name());
            assert!(Command::NAMES.contains(&cmd.name()));
        }
    }

    #[test]
    fn test_fill_description_hides_value() {
        let cmd = Command::FrameFill {
            frame_selector: "iframe[title*=\"card number\"]".into(),
            selector: "input[name=\"cardnumber\"]".into(),
            value: "4242424242424242".into(),
            timeout: 30000,
        };
        assert!(!cmd.describe().contains("4242"));
    }

    #[test]
    fn test_signal_parsing() {
        let signal: CompletionSignal =
            serde_json::from_value(json!({ "via": "new_page", "detail": "https://lumimeds.com/thank-you" })).unwrap();
        assert_eq!(signal.via, SignalSource::NewPage);
        assert_eq!(serde_json::to_value(WaitUntil::DomContentLoaded).unwrap(), "domcontentloaded");
    }
}
