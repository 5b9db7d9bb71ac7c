use std::sync::Arc;

use super::{ensure_trailing_slash, join_url, InteractionRoute, RouteParams};

/// A route that appends one named segment to a base route
///
/// Matching binds the last path segment before the trailing slash and hands
/// the rest of the path to the base route.
#[derive(Clone)]
pub struct IdRoute {
    base: Arc<dyn InteractionRoute>,
    id_name: String,
}

impl IdRoute {
    pub fn new(base: Arc<dyn InteractionRoute>, id_name: &str) -> Self {
        Self {
            base,
            id_name: id_name.to_string(),
        }
    }
}

impl InteractionRoute for IdRoute {
    fn get_path(&self, params: &RouteParams) -> Option<String> {
        let id = params.get(&self.id_name).filter(|id| !id.is_empty())?;
        let path = self.base.get_path(params)?;
        Some(join_url(&path, &ensure_trailing_slash(id)))
    }

    fn match_path(&self, path: &str) -> Option<RouteParams> {
        let without_slash = path.strip_suffix('/')?;
        let split = without_slash.rfind('/')?;
        let (head, id) = (&without_slash[..=split], &without_slash[split + 1..]);
        if id.is_empty() {
            return None;
        }

        let mut params = self.base.match_path(head)?;
        params.insert(self.id_name.clone(), id.to_string());
        Some(params)
    }
}
