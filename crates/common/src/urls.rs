//! URL normalisation used when comparing navigation targets

use url::Url;

use crate::error::{Error, Result};

fn parse(raw: &str) -> Result<Url> {
    Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Drop query string and fragment, keep everything else as-is
pub fn strip_query(raw: &str) -> Result<String> {
    let mut url = parse(raw)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Canonical form for equality checks: no query/fragment, no `www.`,
/// lowercase host, no trailing slash except on the root path.
pub fn normalize(raw: &str) -> Result<String> {
    let mut url = parse(raw)?;
    url.set_query(None);
    url.set_fragment(None);

    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        let bare = host.strip_prefix("www.").unwrap_or(&host).to_string();
        url.set_host(Some(&bare)).map_err(|e| Error::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
    }

    let mut out = url.to_string();
    if url.path() != "/" && out.ends_with('/') {
        out.pop();
    }
    Ok(out)
}

/// Whether two URLs point at the same resource once normalised
pub fn same_destination(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether the query-stripped URL contains `needle`, e.g. a funnel path
pub fn path_contains(raw: &str, needle: &str) -> bool {
    strip_query(raw)
        .map(|u| u.contains(needle))
        .unwrap_or_else(|_| raw.split('?').next().unwrap_or(raw).contains(needle))
}

/// Value of a query parameter, if present
pub fn query_param(raw: &str, key: &str) -> Option<String> {
    let url = parse(raw).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Resolve a possibly-relative href against the page it was found on
pub fn resolve(base: &str, href: &str) -> Result<String> {
    let base = parse(base)?;
    base.join(href.trim())
        .map(|u| u.to_string())
        .map_err(|e| Error::InvalidUrl {
            url: href.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://www.lumimeds.com/privacy-policy?utm_source=ad", "https://lumimeds.com/privacy-policy" ; "www and query")]
    #[test_case("https://LumiMeds.com/terms/#top", "https://lumimeds.com/terms" ; "case fragment and slash")]
    #[test_case("https://lumimeds.com/", "https://lumimeds.com/" ; "root keeps slash")]
    #[test_case("https://lumimeds.com", "https://lumimeds.com/" ; "bare host")]
    fn test_normalize(input: &str, expected: &str) {
        assert_eq!(normalize(input).unwrap(), expected);
    }

    #[test]
    fn test_same_destination() {
        assert!(same_destination(
            "https://www.lumimeds.com/faq?ref=footer",
            "https://lumimeds.com/faq"
        ));
        assert!(!same_destination("https://lumimeds.com/faq", "https://lumimeds.com/faqs"));
        assert!(!same_destination("not a url", "https://lumimeds.com"));
    }

    #[test]
    fn test_path_contains_ignores_query() {
        let url = "https://staging.lumimeds.com/products/survey/weight_loss?from=/ad/glp1";
        assert!(path_contains(url, "/products/survey/weight_loss"));
        assert!(!path_contains(url, "/ad/glp1"));
    }

    #[test]
    fn test_query_param() {
        let url = "https://lumimeds.com/patient/login?intent=patient-login&next=%2Fad%2Fglp1";
        assert_eq!(query_param(url, "intent").as_deref(), Some("patient-login"));
        assert_eq!(query_param(url, "next").as_deref(), Some("/ad/glp1"));
        assert_eq!(query_param(url, "missing"), None);
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve("https://lumimeds.com/ad/glp1", "/privacy-policy").unwrap(),
            "https://lumimeds.com/privacy-policy"
        );
        assert_eq!(
            resolve("https://lumimeds.com/ad/glp1", "https://trustpilot.com/review/lumimeds.com").unwrap(),
            "https://trustpilot.com/review/lumimeds.com"
        );
    }
}
