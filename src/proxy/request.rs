use http::Uri;

/// Path and query of the request as sent by the client (`/` when the URI
/// carries neither, e.g. `OPTIONS *` style targets).
pub fn request_target(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
}

/// Path with the query string removed, for logs.
pub fn redacted_path(path: &str) -> String {
    path.split('?').next().unwrap_or("/").to_string()
}

/// The path that goes into access logs.
pub fn logged_path(uri: &Uri, log_queries: bool) -> String {
    let target = request_target(uri);
    if log_queries {
        target.to_string()
    } else {
        redacted_path(target)
    }
}
