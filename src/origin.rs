//! Referer allow-list.
//!
//! A referer passes when it starts with one of the configured prefixes. This is
//! a plain, case-sensitive string prefix test: `https://localhost` also admits
//! `https://localhost.example.com`, and nothing after the prefix is inspected.

use axum::http::header::REFERER;
use axum::http::HeaderMap;
use thiserror::Error;

/// Why a request was turned away by the origin check.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OriginRejection {
    #[error("missing referer")]
    MissingReferer,
    #[error("referer not in allow-list")]
    NotAllowed,
}

#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    require_origin_check: bool,
    allowed_origins: Vec<String>,
}

impl OriginPolicy {
    /// Every request passes.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Requests must carry a referer starting with one of `prefixes`.
    pub fn allow_list<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            require_origin_check: true,
            allowed_origins: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.require_origin_check
    }

    /// First allow-list entry that `referer` starts with.
    pub fn matching_prefix(&self, referer: &str) -> Option<&str> {
        self.allowed_origins
            .iter()
            .map(String::as_str)
            .find(|prefix| referer.starts_with(prefix))
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), OriginRejection> {
        if !self.require_origin_check {
            return Ok(());
        }

        // A header that isn't visible ASCII is treated the same as no header.
        let referer = headers
            .get(REFERER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(OriginRejection::MissingReferer)?;

        match self.matching_prefix(referer) {
            Some(prefix) => {
                tracing::trace!(referer, prefix, "referer allowed");
                Ok(())
            }
            None => Err(OriginRejection::NotAllowed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn policy() -> OriginPolicy {
        OriginPolicy::allow_list(["https://navatron-maps.azurewebsites.net/", "https://localhost"])
    }

    fn with_referer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_disabled_policy_allows_everything() {
        let policy = OriginPolicy::disabled();
        assert!(!policy.is_enabled());
        assert_eq!(policy.check(&HeaderMap::new()), Ok(()));
        assert_eq!(policy.check(&with_referer("https://evil.example")), Ok(()));
    }

    #[test]
    fn test_missing_or_empty_referer() {
        let policy = policy();
        assert_eq!(
            policy.check(&HeaderMap::new()),
            Err(OriginRejection::MissingReferer)
        );
        assert_eq!(
            policy.check(&with_referer("")),
            Err(OriginRejection::MissingReferer)
        );
    }

    #[test]
    fn test_non_ascii_referer_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_bytes(b"https://localhost/\xe9").unwrap(),
        );
        assert_eq!(policy().check(&headers), Err(OriginRejection::MissingReferer));
    }

    #[test]
    fn test_prefix_match() {
        let policy = policy();
        assert_eq!(policy.check(&with_referer("https://localhost/something")), Ok(()));
        assert_eq!(
            policy.check(&with_referer("https://navatron-maps.azurewebsites.net/x")),
            Ok(())
        );
        // Anything after an allowed prefix is accepted.
        assert_eq!(
            policy.check(&with_referer("https://navatron-maps.azurewebsites.net/evil")),
            Ok(())
        );
        assert_eq!(
            policy.check(&with_referer("https://localhost.attacker.example/")),
            Ok(())
        );
    }

    #[test]
    fn test_unlisted_referer_rejected() {
        let policy = policy();
        assert_eq!(
            policy.check(&with_referer("https://example.com/")),
            Err(OriginRejection::NotAllowed)
        );
        // Needs the trailing slash from the allow-list entry.
        assert_eq!(
            policy.check(&with_referer("https://navatron-maps.azurewebsites.net")),
            Err(OriginRejection::NotAllowed)
        );
        assert_eq!(
            policy.check(&with_referer("http://localhost/")),
            Err(OriginRejection::NotAllowed)
        );
    }

    #[test]
    fn test_match_is_case_sensitive() {
        assert_eq!(
            policy().check(&with_referer("HTTPS://LOCALHOST/")),
            Err(OriginRejection::NotAllowed)
        );
    }

    #[test]
    fn test_first_match_wins() {
        let policy = OriginPolicy::allow_list(["https://localhost", "https://localhost/app"]);
        assert_eq!(
            policy.matching_prefix("https://localhost/app/page"),
            Some("https://localhost")
        );
        assert_eq!(policy.matching_prefix("https://other"), None);
    }

    #[test]
    fn test_enabled_with_empty_list_rejects_all() {
        let policy = OriginPolicy::allow_list(Vec::<String>::new());
        assert_eq!(
            policy.check(&with_referer("https://localhost/")),
            Err(OriginRejection::NotAllowed)
        );
    }
}
