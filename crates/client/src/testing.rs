//! Store and presenter doubles shared by the unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use offgrid_core::{CacheDb, CacheEntry, Error, Store};

use crate::deferred::{Notification, Presenter, PresenterRejected};

/// Wraps an in-memory database, counting operations and optionally failing writes.
pub(crate) struct ObservedStore {
    inner: CacheDb,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl ObservedStore {
    pub(crate) async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry("quota exceeded".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for ObservedStore {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.check_write()?;
        Store::open(&self.inner, generation).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.generations().await
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        self.check_write()?;
        Store::delete_generation(&self.inner, generation).await
    }

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(generation, key).await
    }

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        self.check_write()?;
        self.inner.put(generation, entry).await
    }

    async fn delete(&self, generation: &str, key: &str) -> Result<bool, Error> {
        self.check_write()?;
        self.inner.delete(generation, key).await
    }

    async fn keys(&self, generation: &str, prefix: &str) -> Result<Vec<String>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.keys(generation, prefix).await
    }
}

/// Records everything the engine asks the platform to show.
#[derive(Default)]
pub(crate) struct RecordingPresenter {
    pub(crate) shown: Mutex<Vec<Notification>>,
    pub(crate) closed: Mutex<Vec<String>>,
    pub(crate) opened: Mutex<Vec<Url>>,
    reject: AtomicBool,
}

impl RecordingPresenter {
    /// Decline every show and open request, as a host without permission would.
    pub(crate) fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    fn check(&self, surface: &'static str) -> Result<(), PresenterRejected> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(PresenterRejected::new(surface, "permission denied"));
        }
        Ok(())
    }
}

impl Presenter for RecordingPresenter {
    fn show_notification(&self, notification: &Notification) -> Result<(), PresenterRejected> {
        self.check("notification")?;
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn close_notification(&self, tag: &str) {
        self.closed.lock().unwrap().push(tag.to_string());
    }

    fn open_window(&self, url: &Url) -> Result<(), PresenterRejected> {
        self.check("window")?;
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }
}
