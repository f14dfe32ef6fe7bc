use std::sync::Arc;

use axum::extract::FromRef;

use crate::dispatcher::JobDispatcher;
use crate::probe::RemoteProbe;
use crate::store::Store;

/// Shared server state handed to every handler.
#[derive(Clone)]
pub struct FwState {
    store: Arc<dyn Store>,
    probe: Arc<dyn RemoteProbe>,
    dispatcher: Arc<JobDispatcher>,
}

impl FwState {
    pub fn new(
        store: Arc<dyn Store>,
        probe: Arc<dyn RemoteProbe>,
        dispatcher: Arc<JobDispatcher>,
    ) -> Self {
        Self {
            store,
            probe,
            dispatcher,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn probe(&self) -> &dyn RemoteProbe {
        self.probe.as_ref()
    }

    pub fn dispatcher(&self) -> &JobDispatcher {
        self.dispatcher.as_ref()
    }
}

impl FromRef<FwState> for Arc<dyn Store> {
    fn from_ref(state: &FwState) -> Arc<dyn Store> {
        state.store.clone()
    }
}

impl FromRef<FwState> for Arc<JobDispatcher> {
    fn from_ref(state: &FwState) -> Arc<JobDispatcher> {
        state.dispatcher.clone()
    }
}
