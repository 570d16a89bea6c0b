//! Application state: configuration, the training progress store, and the
//! optional challenge-generator client.
//!
//! Document sourcing policy: a configured generator is authoritative — its
//! failure surfaces as an error state with no retry and no silent fallback.
//! Only when no generator is configured at all does the built-in seed bank
//! serve documents.

use tracing::{error, info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::domain::ChallengeDoc;
use crate::generator::{ChallengeRequest, FetchFailure, Generator};
use crate::seeds;
use crate::store::TrainingStore;

pub struct AppState {
    pub config: AppConfig,
    pub store: TrainingStore,
    pub generator: Option<Generator>,
}

impl AppState {
    /// Build state from env: load config, open the training store, and set
    /// up the generator client when a base URL is configured.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_app_config_from_env().unwrap_or_default();
        let store = TrainingStore::open(config.storage.resolved_path());
        let generator = Generator::from_sources(&config.generator);

        match &generator {
            Some(gen) => {
                info!(target: "matea_backend", base_url = %gen.base_url, "Challenge generator enabled.")
            }
            None => {
                info!(target: "matea_backend", "No generator configured; serving the built-in seed bank.")
            }
        }

        Self { config, store, generator }
    }

    /// Source one challenge document for the request, returning it together
    /// with an origin label for the logs.
    #[instrument(level = "info", skip(self, req), fields(challenge_type = req.challenge_type.as_str()))]
    pub async fn new_challenge_doc(
        &self,
        req: ChallengeRequest,
    ) -> Result<(ChallengeDoc, &'static str), FetchFailure> {
        if let Some(gen) = &self.generator {
            match gen.create_challenge(&req).await {
                Ok(doc) => {
                    info!(target: "challenge", challenge_id = %doc.challenge_id, items = doc.items.len(), source = "generator", "Challenge document served");
                    Ok((doc, "generator"))
                }
                Err(e) => {
                    error!(target: "challenge", error = %e, "Generator fetch failed; surfacing error state");
                    Err(e)
                }
            }
        } else {
            let doc = seeds::seed_doc(req.challenge_type, req.difficulty.clone(), req.count);
            if doc.items.is_empty() {
                warn!(target: "challenge", challenge_type = req.challenge_type.as_str(), "Seed bank returned no items");
            }
            info!(target: "challenge", challenge_id = %doc.challenge_id, items = doc.items.len(), source = "seed_bank", "Challenge document served");
            Ok((doc, "seed_bank"))
        }
    }
}
