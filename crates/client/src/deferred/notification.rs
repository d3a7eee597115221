//! Push rendering and notification click routing.

use serde::Serialize;
use url::Url;

use offgrid_core::Error;

use super::Coordinator;

/// The platform declined a notification or window request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{surface} rejected: {reason}")]
pub struct PresenterRejected {
    pub surface: &'static str,
    pub reason: String,
}

impl PresenterRejected {
    pub fn new(surface: &'static str, reason: impl Into<String>) -> Self {
        Self { surface, reason: reason.into() }
    }
}

impl From<PresenterRejected> for Error {
    fn from(err: PresenterRejected) -> Self {
        Error::Presenter(err.to_string())
    }
}

/// The platform's notification and window surface.
///
/// Calls return once the platform has accepted the request; rendering never
/// touches the network.
pub trait Presenter: Send + Sync {
    fn show_notification(&self, notification: &Notification) -> Result<(), PresenterRejected>;

    fn close_notification(&self, tag: &str);

    /// Open the application at `url`, or focus it if already open there.
    fn open_window(&self, url: &Url) -> Result<(), PresenterRejected>;
}

/// Presenter for headless hosts: every request becomes a log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn show_notification(&self, notification: &Notification) -> Result<(), PresenterRejected> {
        tracing::info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            actions = notification.actions.len(),
            "show notification"
        );
        Ok(())
    }

    fn close_notification(&self, tag: &str) {
        tracing::info!(tag = %tag, "close notification");
    }

    fn open_window(&self, url: &Url) -> Result<(), PresenterRejected> {
        tracing::info!(url = %url, "open window");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: i64,
    pub primary_key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationButton {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

/// A user-visible notification built from a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationButton>,
}

impl Coordinator {
    /// Render a notification for a push message.
    pub fn push(&self, message: Option<&[u8]>) -> Result<Notification, Error> {
        let settings = &self.config.notification;
        let body = match message {
            Some(bytes) if !bytes.is_empty() => String::from_utf8_lossy(bytes).into_owned(),
            _ => settings.default_body.clone(),
        };
        let arrived = chrono::Utc::now().timestamp_millis();

        let notification = Notification {
            tag: format!("push-{arrived}"),
            title: settings.title.clone(),
            body,
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
            vibrate: settings.vibrate.clone(),
            data: NotificationData { date_of_arrival: arrived, primary_key: 1 },
            actions: settings
                .actions
                .iter()
                .map(|a| NotificationButton { action: a.action.clone(), title: a.title.clone(), icon: a.icon.clone() })
                .collect(),
        };

        if let Err(err) = self.presenter.show_notification(&notification) {
            tracing::warn!(error = %err, "notification {} not shown", notification.tag);
            return Err(err.into());
        }
        Ok(notification)
    }

    /// Close the clicked notification and route its action.
    ///
    /// Returns the location opened, if any. Actions without a target and
    /// unknown actions only close the notification.
    pub fn notification_click(&self, tag: &str, action: &str) -> Result<Option<Url>, Error> {
        self.presenter.close_notification(tag);

        let Some(target) = self.config.notification_action(action).and_then(|a| a.target.as_deref()) else {
            tracing::debug!("notification action {action:?} has no target");
            return Ok(None);
        };

        let url = self.app_url(target)?;
        if let Err(err) = self.presenter.open_window(&url) {
            tracing::warn!(error = %err, "could not open {url}");
            return Err(err.into());
        }
        Ok(Some(url))
    }
}
