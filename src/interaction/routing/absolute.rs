use super::{ensure_trailing_slash, InteractionRoute, RouteParams};

/// A route consisting of a single fixed URL
#[derive(Debug, Clone)]
pub struct AbsolutePathRoute {
    path: String,
}

impl AbsolutePathRoute {
    pub fn new(path: &str) -> Self {
        Self {
            path: ensure_trailing_slash(path),
        }
    }
}

impl InteractionRoute for AbsolutePathRoute {
    fn get_path(&self, _params: &RouteParams) -> Option<String> {
        Some(self.path.clone())
    }

    fn match_path(&self, path: &str) -> Option<RouteParams> {
        (path == self.path).then(RouteParams::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_path() {
        let route = AbsolutePathRoute::new("http://srv/.account");
        assert_eq!(
            route.get_path(&RouteParams::new()).as_deref(),
            Some("http://srv/.account/")
        );
        assert_eq!(route.match_path("http://srv/.account/"), Some(RouteParams::new()));
        assert_eq!(route.match_path("http://srv/.account"), None);
        assert_eq!(route.match_path("http://srv/.account/x/"), None);
    }
}
