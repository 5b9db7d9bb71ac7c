//! Bidirectional URL routes for the account API
//!
//! A route generates a concrete URL from named parameters and parses a URL
//! back into those parameters. Routes nest: a `RelativePathRoute` appends a
//! fixed suffix to its base and an `IdRoute` appends one named segment.
//! For any parameters a route accepts, `match_path(get_path(p)) == p`.

mod absolute;
mod handler;
mod id;
mod relative;

pub use absolute::AbsolutePathRoute;
pub use handler::RouteHandler;
pub use id::IdRoute;
pub use relative::RelativePathRoute;

use std::collections::BTreeMap;

/// Named path parameters
pub type RouteParams = BTreeMap<String, String>;

/// Parameter holding the account id; checked against the session by `RouteHandler`
pub const ACCOUNT_ID: &str = "accountId";
pub const CREDENTIALS_ID: &str = "credentialsId";
pub const PASSWORD_ID: &str = "passwordId";
pub const POD_ID: &str = "podId";
pub const WEB_ID_HASH: &str = "webIdHash";

/// A path template that can be generated and matched
pub trait InteractionRoute: Send + Sync {
    /// Generate the URL, or `None` when a required parameter is missing
    fn get_path(&self, params: &RouteParams) -> Option<String>;

    /// Parse a URL, returning the bound parameters when it matches
    fn match_path(&self, path: &str) -> Option<RouteParams>;
}

/// Build `RouteParams` from literal pairs
pub fn route_params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> RouteParams {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn ensure_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Join a base URL and a relative path with exactly one separator
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://srv/", "/a/"), "http://srv/a/");
        assert_eq!(join_url("http://srv", "a"), "http://srv/a");
        assert_eq!(join_url("http://srv//", "//a/b/"), "http://srv/a/b/");
    }

    #[test]
    fn test_ensure_trailing_slash() {
        assert_eq!(ensure_trailing_slash("http://srv/a"), "http://srv/a/");
        assert_eq!(ensure_trailing_slash("http://srv/a/"), "http://srv/a/");
    }
}
