use hyper::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::interaction::{InteractionHandler, InteractionInput, JsonObject};
use crate::types::{GatehouseError, Result};

/// Replays registration inputs from a JSON file at start-up
///
/// The file holds an array of registration inputs. Entries without an
/// `account` section get an empty one so every entry creates an account.
pub struct SeededAccountInitializer {
    registration: Arc<dyn InteractionHandler>,
    registration_url: String,
    path: PathBuf,
}

impl SeededAccountInitializer {
    pub fn new(
        registration: Arc<dyn InteractionHandler>,
        registration_url: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registration,
            registration_url: registration_url.into(),
            path: path.into(),
        }
    }

    async fn read_entries(&self) -> Result<Vec<JsonObject>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<Value> = serde_json::from_str(&content)?;
        entries
            .into_iter()
            .map(|entry| match entry {
                Value::Object(object) => Ok(object),
                _ => Err(GatehouseError::BadRequest(format!(
                    "Entries in {} must be JSON objects.",
                    self.path.display()
                ))),
            })
            .collect()
    }

    /// Register every entry, returning how many completed without errors
    pub async fn run(&self) -> Result<usize> {
        let entries = self.read_entries().await?;
        let total = entries.len();
        let mut registered = 0;

        for mut entry in entries {
            entry
                .entry("account")
                .or_insert_with(|| Value::Object(JsonObject::new()));
            let name = entry
                .get("login")
                .and_then(|login| login.get("email"))
                .and_then(Value::as_str)
                .unwrap_or("<no login>")
                .to_string();

            let input = InteractionInput::new(Method::POST, self.registration_url.clone())
                .with_json(Value::Object(entry));
            let result = match self.registration.handle_safe(&input).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Unable to create seeded account {}: {}", name, e);
                    continue;
                }
            };

            let failed: Vec<(&String, &str)> = result
                .json
                .iter()
                .filter_map(|(step, value)| {
                    value
                        .get("error")
                        .and_then(Value::as_str)
                        .map(|error| (step, error))
                })
                .collect();
            if failed.is_empty() {
                registered += 1;
            }
            for (step, error) in failed {
                warn!("Seeded account {}: {} step failed: {}", name, step, error);
            }
        }

        info!("Initialized {} of {} seeded accounts", registered, total);
        Ok(registered)
    }
}
