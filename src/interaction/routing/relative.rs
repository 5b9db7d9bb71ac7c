use std::sync::Arc;

use super::{ensure_trailing_slash, join_url, InteractionRoute, RouteParams};

/// A route that appends a fixed relative path to a base route
#[derive(Clone)]
pub struct RelativePathRoute {
    base: Arc<dyn InteractionRoute>,
    relative_path: String,
}

impl RelativePathRoute {
    pub fn new(base: Arc<dyn InteractionRoute>, relative_path: &str) -> Self {
        Self {
            base,
            relative_path: ensure_trailing_slash(relative_path)
                .trim_start_matches('/')
                .to_string(),
        }
    }
}

impl InteractionRoute for RelativePathRoute {
    fn get_path(&self, params: &RouteParams) -> Option<String> {
        self.base
            .get_path(params)
            .map(|path| join_url(&path, &self.relative_path))
    }

    fn match_path(&self, path: &str) -> Option<RouteParams> {
        let head = path.strip_suffix(self.relative_path.as_str())?;
        self.base.match_path(head)
    }
}
