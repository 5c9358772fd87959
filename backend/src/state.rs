//! Application-wide dependencies shared with every handler as `web::Data<AppState>`.

use crate::config::AppConfig;
use crate::services::schema::registry::SchemaRegistry;
use crate::services::templates::suggest::{DisabledSuggestions, SuggestionService};
use crate::storage::{ObjectStore, RelationalStore};
use common::matching::MatchConfig;
use common::populate::Populator;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub db: Arc<dyn RelationalStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub registry: SchemaRegistry,
    pub suggestions: Arc<dyn SuggestionService>,
}

impl AppState {
    pub fn new(config: AppConfig, db: Arc<dyn RelationalStore>, objects: Arc<dyn ObjectStore>) -> Self {
        let registry = SchemaRegistry::new(db.clone(), config.schema_ttl, MatchConfig::default());
        Self {
            config,
            db,
            objects,
            registry,
            suggestions: Arc::new(DisabledSuggestions),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Arc<dyn SuggestionService>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Populator configured with the service's fuzzy threshold.
    pub fn populator(&self) -> Populator {
        Populator::new(MatchConfig::default().with_threshold(self.config.fuzzy_threshold))
    }
}
