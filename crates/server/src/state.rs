use std::sync::Arc;

use snaggle_core::policy::PolicyStore;
use snaggle_core::{
    CandidateService, Config, EventPublisher, ImportService, JobService, SanitizedConfig,
    SettingsService,
};

/// Shared application state
pub struct AppState {
    config: Config,
    candidates: CandidateService,
    jobs: JobService,
    imports: ImportService,
    settings: Arc<SettingsService>,
    events: EventPublisher,
}

impl AppState {
    pub fn new(
        config: Config,
        candidates: CandidateService,
        jobs: JobService,
        imports: ImportService,
        settings: Arc<SettingsService>,
        events: EventPublisher,
    ) -> Self {
        Self {
            config,
            candidates,
            jobs,
            imports,
            settings,
            events,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn candidates(&self) -> &CandidateService {
        &self.candidates
    }

    /// The store the policy engine evaluates from.
    pub fn policies(&self) -> &Arc<dyn PolicyStore> {
        self.candidates.engine().store()
    }

    pub fn jobs(&self) -> &JobService {
        &self.jobs
    }

    pub fn imports(&self) -> &ImportService {
        &self.imports
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }
}
