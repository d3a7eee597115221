//! Signal dispatch.
//!
//! The engine is built once from an immutable [`AppConfig`] and routes each
//! lifecycle signal to its handler. A signal is finished when
//! [`Engine::dispatch`] resolves; handlers never return before their work
//! (store writes included, background revalidation excepted) is done.

use std::sync::Arc;

use serde::Serialize;
use url::Url;

use offgrid_core::{AppConfig, Classifier, Error, Request, Response, Store, Strategy};

use crate::deferred::{Coordinator, Notification, Presenter, RefreshOutcome, ReplayReport};
use crate::fetch::Fetcher;
use crate::generation::{ActivateReport, GenerationManager, InstallReport, Lifecycle};
use crate::strategy::StrategyExecutor;

/// A lifecycle signal delivered by the host platform.
#[derive(Debug, Clone)]
pub enum Signal {
    Install,
    Activate,
    Fetch(Request),
    Sync(String),
    PeriodicSync(String),
    Push(Option<Vec<u8>>),
    NotificationClick { tag: String, action: String },
}

/// Result of handling one signal.
#[derive(Debug, Clone)]
pub enum Outcome {
    Installed { install: InstallReport, activation: Option<ActivateReport> },
    Activated(ActivateReport),
    Served(Served),
    /// `None` when the tag was not ours.
    Replayed(Option<ReplayReport>),
    Refreshed(Option<RefreshOutcome>),
    Notified(Notification),
    Clicked(Option<Url>),
}

/// Which path answered an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "strategy", rename_all = "snake_case")]
pub enum Route {
    /// No generation is controlling yet; forwarded untouched.
    Uncontrolled,
    ShareTarget,
    Strategy(Strategy),
}

/// A response together with the route that produced it.
#[derive(Debug, Clone)]
pub struct Served {
    pub route: Route,
    pub response: Response,
}

/// Install report plus the activation `skip_waiting` triggered, if any.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub install: InstallReport,
    pub activation: Option<ActivateReport>,
}

/// The offline caching engine.
pub struct Engine {
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    classifier: Classifier,
    generations: GenerationManager,
    executor: StrategyExecutor,
    coordinator: Coordinator,
}

impl Engine {
    /// Wire the engine together.
    ///
    /// # Errors
    ///
    /// Fails on an invalid origin or a pattern rule that does not compile.
    pub fn new(
        config: AppConfig, store: Arc<dyn Store>, fetcher: Arc<dyn Fetcher>, presenter: Arc<dyn Presenter>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let classifier = Classifier::new(origin.clone(), &config.rules)?;
        let config = Arc::new(config);

        let generations = GenerationManager::new(store.clone(), fetcher.clone(), config.clone(), origin.clone());
        let executor = StrategyExecutor::new(
            fetcher.clone(),
            store.clone(),
            config.generation.clone(),
            config.timeout(),
            generations.offline_key()?,
        );
        let coordinator = Coordinator::new(store.clone(), fetcher, presenter, config.clone(), origin);

        tracing::info!(
            generation = %config.generation,
            origin = %config.origin,
            rules = classifier.len(),
            "engine ready"
        );

        Ok(Self { config, store, classifier, generations, executor, coordinator })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        self.generations.state().await
    }

    /// Store generations currently present.
    pub async fn generations(&self) -> Result<Vec<String>, Error> {
        self.store.generations().await
    }

    /// Handle one signal to completion.
    pub async fn dispatch(&self, signal: Signal) -> Result<Outcome, Error> {
        let outcome = match signal {
            Signal::Install => {
                let InstallOutcome { install, activation } = self.install().await;
                Outcome::Installed { install, activation }
            }
            Signal::Activate => Outcome::Activated(self.activate().await),
            Signal::Fetch(request) => Outcome::Served(self.handle_fetch(&request).await),
            Signal::Sync(tag) => Outcome::Replayed(self.coordinator.replay_mutations(&tag).await),
            Signal::PeriodicSync(tag) => Outcome::Refreshed(self.coordinator.periodic_refresh(&tag).await),
            Signal::Push(message) => Outcome::Notified(self.coordinator.push(message.as_deref())?),
            Signal::NotificationClick { tag, action } => {
                Outcome::Clicked(self.coordinator.notification_click(&tag, &action)?)
            }
        };
        Ok(outcome)
    }

    /// Install the current generation, activating straight away when `skip_waiting` is set.
    async fn install(&self) -> InstallOutcome {
        let install = self.generations.install().await;
        let activation = if self.config.skip_waiting { Some(self.generations.activate().await) } else { None };
        InstallOutcome { install, activation }
    }

    async fn activate(&self) -> ActivateReport {
        self.generations.activate().await
    }

    /// Answer an intercepted request. Never fails.
    ///
    /// The lifecycle is read once, so the reported route is the one taken.
    async fn handle_fetch(&self, request: &Request) -> Served {
        if !self.generations.is_controlling().await {
            tracing::debug!("not controlling yet; forwarding {} {}", request.method, request.url);
            let response = self.executor.passthrough(request).await;
            return Served { route: Route::Uncontrolled, response };
        }

        if request.is_same_origin(self.classifier.origin()) && self.coordinator.is_share_delivery(request) {
            let response = self.coordinator.ingest_share(request).await;
            return Served { route: Route::ShareTarget, response };
        }

        let strategy = self.classifier.classify(request);
        tracing::debug!(strategy = %strategy, "{} {}", request.method, request.url);
        let response = self.executor.execute(strategy, request).await;
        Served { route: Route::Strategy(strategy), response }
    }
}
