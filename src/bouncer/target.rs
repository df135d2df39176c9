use std::sync::Arc;

use http::{Method, Uri};
use regex::Regex;

use crate::proxy::request::request_target;

/// Selects the requests a bouncer applies to: an HTTP method (compared
/// case-insensitively) and a regular expression searched anywhere in the
/// request's path and query.
#[derive(Debug, Clone)]
pub struct Target {
    method: Arc<str>,
    uri_regex: Regex,
}

impl Target {
    pub fn new(method: impl Into<Arc<str>>, uri_regex: Regex) -> Self {
        Self {
            method: method.into(),
            uri_regex,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri_regex(&self) -> &Regex {
        &self.uri_regex
    }

    pub fn matches(&self, method: &Method, uri: &Uri) -> bool {
        self.method.eq_ignore_ascii_case(method.as_str())
            && self.uri_regex.is_match(request_target(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(method: &str, pattern: &str) -> Target {
        Target::new(method, Regex::new(pattern).unwrap())
    }

    #[test]
    fn method_comparison_ignores_case() {
        let target = target("post", "/api/v2/silences");
        let uri: Uri = "/api/v2/silences".parse().unwrap();
        assert!(target.matches(&Method::POST, &uri));
        assert!(!target.matches(&Method::GET, &uri));
    }

    #[test]
    fn regex_is_searched_not_anchored() {
        let target = target("POST", "silences");
        let uri: Uri = "/api/v2/silences".parse().unwrap();
        assert!(target.matches(&Method::POST, &uri));
    }

    #[test]
    fn regex_sees_query_string() {
        let target = target("GET", r"\?dry=1$");
        let with_query: Uri = "/api/v2/alerts?dry=1".parse().unwrap();
        let without_query: Uri = "/api/v2/alerts".parse().unwrap();
        assert!(target.matches(&Method::GET, &with_query));
        assert!(!target.matches(&Method::GET, &without_query));
    }

    #[test]
    fn anchored_pattern_does_not_match_other_paths() {
        let target = target("POST", "^/api/v2/silences$");
        let uri: Uri = "/api/v1/silences".parse().unwrap();
        assert!(!target.matches(&Method::POST, &uri));
    }
}
