//! Footer link resolution
//!
//! Footer anchors are followed over plain HTTP (redirects included) instead of
//! clicking through them in the browser, then compared to where the catalog
//! says they must lead.

use reqwest::redirect::Policy;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use lumimeds_common::urls;

use crate::catalog::FooterLink;
use crate::error::E2eResult;
use crate::protocol::RawLink;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Ok,
    /// No anchor with that text or destination in the footer
    Missing,
    /// Resolves, but somewhere else
    WrongDestination,
    /// Error status or unreachable
    Broken,
}

/// Result for one declared footer link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCheck {
    pub text: String,
    pub expected: String,
    pub href: Option<String>,
    pub resolved: Option<String>,
    pub http_status: Option<u16>,
    pub status: LinkStatus,
}

impl LinkCheck {
    pub fn is_ok(&self) -> bool {
        self.status == LinkStatus::Ok
    }

    pub fn describe(&self) -> String {
        match self.status {
            LinkStatus::Ok => format!("✓ {} -> {}", self.text, self.expected),
            LinkStatus::Missing => format!("✗ {} not found in footer", self.text),
            LinkStatus::WrongDestination => format!(
                "✗ {} resolved to {} instead of {}",
                self.text,
                self.resolved.as_deref().unwrap_or("?"),
                self.expected
            ),
            LinkStatus::Broken => format!(
                "✗ {} ({}) is broken: HTTP {}",
                self.text,
                self.href.as_deref().unwrap_or("?"),
                self.http_status.map(|s| s.to_string()).unwrap_or_else(|| "unreachable".into())
            ),
        }
    }
}

/// Follows links over HTTP
#[derive(Debug, Clone)]
pub struct LinkChecker {
    client: Client,
    base_url: String,
}

impl LinkChecker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> E2eResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("lumimeds-e2e/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Absolute URL a declared link must lead to
    pub fn expected_url(&self, link: &FooterLink) -> E2eResult<String> {
        Ok(urls::resolve(&self.base_url, &link.path)?)
    }

    /// Follow `href` and return the status and final URL
    pub async fn resolve(&self, href: &str) -> E2eResult<(u16, String)> {
        let response = self.client.get(href).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        debug!("{} -> {} ({})", href, url, status);
        Ok((status, url))
    }

    /// Check every declared link against the anchors found on the page
    pub async fn check(&self, declared: &[FooterLink], found: &[RawLink]) -> E2eResult<Vec<LinkCheck>> {
        let mut checks = Vec::with_capacity(declared.len());
        for link in declared {
            let expected = self.expected_url(link)?;
            let anchor = find_anchor(link, &expected, found);

            let mut check = LinkCheck {
                text: link.text.clone(),
                expected: expected.clone(),
                href: anchor.map(|a| a.href.clone()),
                resolved: None,
                http_status: None,
                status: LinkStatus::Missing,
            };

            if let Some(anchor) = anchor {
                match self.resolve(&anchor.href).await {
                    Ok((status, resolved)) => {
                        check.http_status = Some(status);
                        check.status = if status >= 400 {
                            LinkStatus::Broken
                        } else if urls::same_destination(&resolved, &expected) {
                            LinkStatus::Ok
                        } else {
                            LinkStatus::WrongDestination
                        };
                        check.resolved = Some(resolved);
                    }
                    Err(e) => {
                        debug!("{} unreachable: {}", anchor.href, e);
                        check.status = LinkStatus::Broken;
                    }
                }
            }
            checks.push(check);
        }
        Ok(checks)
    }
}

/// Match by visible text first, then by destination
fn find_anchor<'a>(link: &FooterLink, expected: &str, found: &'a [RawLink]) -> Option<&'a RawLink> {
    let wanted = link.text.trim().to_lowercase();
    found
        .iter()
        .find(|a| a.text.trim().to_lowercase() == wanted)
        .or_else(|| found.iter().find(|a| urls::same_destination(&a.href, expected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn declared(text: &str, path: &str) -> FooterLink {
        FooterLink {
            text: text.to_string(),
            path: path.to_string(),
        }
    }

    fn anchor(text: &str, href: String) -> RawLink {
        RawLink {
            text: text.to_string(),
            href,
        }
    }

    #[tokio::test]
    async fn test_footer_links_resolved_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/privacy-policy"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/terms"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/terms-of-use"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/terms-of-use"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/faqs"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let base = server.uri();
        let checker = LinkChecker::new(base.clone(), Duration::from_secs(5)).unwrap();
        let declared = vec![
            declared("Privacy Policy", "/privacy-policy"),
            declared("Terms of Use", "/terms-of-use"),
            declared("FAQ", "/faqs"),
            declared("Contact Us", "/contact-us"),
            declared("Telehealth Consent", "/telehealth-consent"),
        ];
        let found = vec![
            anchor("Privacy Policy", format!("{}/privacy-policy?utm_source=footer", base)),
            anchor("Terms", format!("{}/terms", base)),
            anchor("FAQ", format!("{}/faqs", base)),
            anchor("Contact Us", format!("{}/contact", base)),
        ];

        let checks = checker.check(&declared, &found).await.unwrap();
        let statuses: Vec<_> = checks.iter().map(|c| c.status).collect();
        assert_eq!(
            statuses,
            vec![
                LinkStatus::Ok,
                LinkStatus::Missing,
                LinkStatus::Broken,
                LinkStatus::WrongDestination,
                LinkStatus::Missing,
            ]
        );
        assert_eq!(checks[2].http_status, Some(404));
        assert!(checks[3].describe().contains("instead of"));
    }

    #[tokio::test]
    async fn test_anchor_matched_by_destination_when_text_differs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/terms-of-use"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let base = server.uri();
        let checker = LinkChecker::new(base.clone(), Duration::from_secs(5)).unwrap();
        let found = vec![anchor("Términos", format!("{}/terms-of-use?ref=footer", base))];
        let checks = checker
            .check(&[declared("Terms of Use", "/terms-of-use")], &found)
            .await
            .unwrap();
        assert!(checks[0].is_ok(), "{:?}", checks[0]);
    }

    #[test]
    fn test_expected_url_accepts_absolute_paths() {
        let checker = LinkChecker::new("https://lumimeds.com", Duration::from_secs(1)).unwrap();
        let link = declared("Reviews", "https://www.trustpilot.com/review/lumimeds.com");
        assert_eq!(
            checker.expected_url(&link).unwrap(),
            "https://www.trustpilot.com/review/lumimeds.com"
        );
    }
}
