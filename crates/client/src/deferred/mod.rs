//! Deferred work triggered by wake-up signals.
//!
//! Handlers live next to the data they touch:
//!
//! - [`mutations`]: queued offline writes, replayed on a sync signal
//! - [`refresh`]: the periodic refresh of one designated resource
//! - [`notification`]: push rendering and notification click routing
//! - [`share`]: share-target ingestion and the Shared Payload slot
//!
//! Every handler resolves only after its work is done; none of them fail the
//! signal on a network or store error.

use std::sync::Arc;

use url::Url;

use offgrid_core::{AppConfig, Error, Store};

use crate::fetch::Fetcher;

mod mutations;
mod notification;
mod refresh;
mod share;

pub use mutations::ReplayReport;
pub use notification::{
    Notification, NotificationButton, NotificationData, Presenter, PresenterRejected, TracingPresenter,
};
pub use refresh::RefreshOutcome;
pub use share::{SHARE_REDIRECT_STATUS, SharedPayload};

/// Runs deferred work against the current store generation.
pub struct Coordinator {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    presenter: Arc<dyn Presenter>,
    config: Arc<AppConfig>,
    origin: Url,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>, presenter: Arc<dyn Presenter>, config: Arc<AppConfig>,
        origin: Url,
    ) -> Self {
        Self { store, fetcher, presenter, config, origin }
    }

    fn generation(&self) -> &str {
        &self.config.generation
    }

    /// Resolve an application path against the origin.
    fn app_url(&self, path: &str) -> Result<Url, Error> {
        offgrid_core::request::resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use crate::fetch::scripted::ScriptedFetcher;
    use crate::testing::{ObservedStore, RecordingPresenter};

    pub(crate) const ORIGIN: &str = "https://app.example.com";

    pub(crate) struct Harness {
        pub(crate) coordinator: Coordinator,
        pub(crate) store: Arc<ObservedStore>,
        pub(crate) fetcher: Arc<ScriptedFetcher>,
        pub(crate) presenter: Arc<RecordingPresenter>,
    }

    pub(crate) fn config() -> AppConfig {
        AppConfig { origin: ORIGIN.into(), generation: "v1".into(), timeout_ms: 200, ..Default::default() }
    }

    pub(crate) async fn harness() -> Harness {
        let store = Arc::new(ObservedStore::new().await);
        let fetcher = Arc::new(ScriptedFetcher::new());
        let presenter = Arc::new(RecordingPresenter::default());
        let coordinator = Coordinator::new(
            store.clone(),
            fetcher.clone(),
            presenter.clone(),
            Arc::new(config()),
            Url::parse(ORIGIN).unwrap(),
        );
        Harness { coordinator, store, fetcher, presenter }
    }

    pub(crate) fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }
}
