use std::collections::HashSet;

use http::HeaderMap;
use http::header::{CONNECTION, HeaderName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDisposition {
    Connection,
    HopByHop,
    Forward,
}

pub fn classify_header(name: &str) -> HeaderDisposition {
    if name == "connection" {
        HeaderDisposition::Connection
    } else if name.starts_with("proxy-")
        || matches!(
            name,
            "keep-alive" | "te" | "trailer" | "transfer-encoding" | "upgrade"
        )
    {
        HeaderDisposition::HopByHop
    } else {
        HeaderDisposition::Forward
    }
}

/// Removes headers that only apply to a single connection: the fixed
/// hop-by-hop set plus every header named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let tokens: HashSet<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let doomed: Vec<HeaderName> = headers
        .keys()
        .filter(|name| {
            classify_header(name.as_str()) != HeaderDisposition::Forward
                || tokens.contains(name.as_str())
        })
        .cloned()
        .collect();

    for name in doomed {
        headers.remove(&name);
    }
}
