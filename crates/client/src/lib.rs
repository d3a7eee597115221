//! Client side of offgrid.
//!
//! This crate turns intercepted requests and lifecycle signals into responses
//! and store writes: the network fetcher, strategy execution, generation
//! lifecycle, deferred work and the [`Engine`] that dispatches between them.

pub mod deferred;
pub mod engine;
pub mod fetch;
pub mod generation;
pub mod strategy;
pub mod timeout;

#[cfg(test)]
mod testing;

pub use deferred::{
    Coordinator, Notification, Presenter, PresenterRejected, RefreshOutcome, ReplayReport, SharedPayload,
    TracingPresenter,
};
pub use engine::{Engine, InstallOutcome, Outcome, Route, Served, Signal};
pub use fetch::{FetchConfig, Fetcher, HttpFetcher, fetch_within};
pub use generation::{ActivateReport, InstallReport, Lifecycle};
pub use strategy::StrategyExecutor;
pub use timeout::{TimedOut, with_timeout};
