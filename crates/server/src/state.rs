use std::sync::Arc;

use slotrush_core::{
    BookingScheduler, Config, SanitizedConfig, SchedulerHandle, TaskStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn TaskStore>,
    scheduler: Option<Arc<BookingScheduler>>,
    scheduler_handle: Option<SchedulerHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn TaskStore>,
        scheduler: Option<Arc<BookingScheduler>>,
    ) -> Self {
        let scheduler_handle = scheduler.as_ref().map(|s| s.handle());
        Self {
            config,
            store,
            scheduler,
            scheduler_handle,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn TaskStore {
        self.store.as_ref()
    }

    /// The running scheduler, if one was configured at startup.
    pub fn scheduler(&self) -> Option<&Arc<BookingScheduler>> {
        self.scheduler.as_ref()
    }

    /// Handle for notifying the scheduler about task changes.
    pub fn scheduler_handle(&self) -> Option<&SchedulerHandle> {
        self.scheduler_handle.as_ref()
    }
}
