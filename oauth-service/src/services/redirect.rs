//! Open-redirect protection for every caller-supplied destination.

use url::Url;

use super::error::ServiceError;

/// Accepts a destination only when it stays on the tenant host or one of
/// its subdomains, over http or https.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectGuard;

impl RedirectGuard {
    /// Resolves `candidate` against `base_url` (the tenant root) and
    /// validates the result. An empty candidate means the tenant root.
    pub fn resolve(candidate: &str, base_url: &str) -> Result<Url, ServiceError> {
        let base = Url::parse(base_url).map_err(|_| ServiceError::ForbiddenRedirect)?;
        let tenant_host = authority(&base).ok_or(ServiceError::ForbiddenRedirect)?;

        let candidate = candidate.trim();
        let url = if candidate.is_empty() {
            base
        } else {
            base.join(candidate)
                .map_err(|_| ServiceError::ForbiddenRedirect)?
        };

        Self::validate(&url, &tenant_host)?;
        Ok(url)
    }

    pub fn validate(url: &Url, tenant_host: &str) -> Result<(), ServiceError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ServiceError::ForbiddenRedirect);
        }

        let host = authority(url).ok_or(ServiceError::ForbiddenRedirect)?;
        let tenant_host = tenant_host.to_ascii_lowercase();

        // A bare suffix match would let `evil-avengers.test.fider.io` through.
        if host == tenant_host || host.ends_with(&format!(".{}", tenant_host)) {
            Ok(())
        } else {
            Err(ServiceError::ForbiddenRedirect)
        }
    }
}

/// `host[:port]` of an URL, lowercased.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Path and query of an URL, e.g. `/posts/1?sort=new`.
pub fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://avengers.test.fider.io";

    fn resolve(candidate: &str) -> Result<Url, ServiceError> {
        RedirectGuard::resolve(candidate, BASE)
    }

    #[test]
    fn test_same_host_and_subdomains_are_accepted() {
        for candidate in [
            "http://avengers.test.fider.io",
            "http://avengers.test.fider.io/posts/1?sort=new",
            "https://avengers.test.fider.io/",
            "http://login.avengers.test.fider.io/x",
            "http://AVENGERS.test.fider.io/x",
        ] {
            assert!(resolve(candidate).is_ok(), "{} was rejected", candidate);
        }
    }

    #[test]
    fn test_foreign_hosts_are_rejected() {
        for candidate in [
            "http://evil.com",
            "http://avengers.test.fider.io.evil.com/",
            "http://evil-avengers.test.fider.io/",
            "http://test.fider.io/",
            "//evil.com",
            "/\\evil.com",
            "http://avengers.test.fider.io@evil.com/",
            "javascript:alert(1)",
            "ftp://avengers.test.fider.io/",
            "data:text/html,hi",
        ] {
            assert!(
                matches!(resolve(candidate), Err(ServiceError::ForbiddenRedirect)),
                "{} was accepted",
                candidate
            );
        }
    }

    #[test]
    fn test_relative_and_empty_candidates_resolve_on_tenant() {
        assert_eq!(resolve("").unwrap().as_str(), "http://avengers.test.fider.io/");
        assert_eq!(
            resolve("/posts/1?x=y").unwrap().as_str(),
            "http://avengers.test.fider.io/posts/1?x=y"
        );
    }

    #[test]
    fn test_port_is_part_of_the_host() {
        let base = "http://localhost:3000";
        assert!(RedirectGuard::resolve("http://localhost:3000/x", base).is_ok());
        assert!(RedirectGuard::resolve("http://localhost:4000/x", base).is_err());
        assert!(RedirectGuard::resolve("http://localhost/x", base).is_err());
    }

    #[test]
    fn test_request_uri_keeps_path_and_query() {
        let url = Url::parse("http://avengers.test.fider.io/a/b?c=d").unwrap();
        assert_eq!(request_uri(&url), "/a/b?c=d");

        let url = Url::parse("http://avengers.test.fider.io").unwrap();
        assert_eq!(request_uri(&url), "/");
    }
}
