//! Keyed store of remote-read results.
//!
//! Concurrency model:
//! - One `std::sync::Mutex` guards all bookkeeping and is never held across
//!   an `.await`.
//! - A key is fetched by at most one task at a time. The first caller marks
//!   the entry `Loading` and does the remote call without holding the lock;
//!   later callers park on a oneshot and receive the leader's result.
//! - `clear()` bumps an epoch. A leader that settles under an older epoch
//!   drops its result instead of writing it.
//! - Observers are invoked synchronously after each write, outside the lock.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use common::retry::RetryPolicy;
use common::{
    CategoryCount, CompanySubmission, ContactFormSubmission, Internship, Role, UserProfile,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{QueryError, RemoteError};

/// The remote read a key belongs to, ignoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    CallerProfile,
    AdminFlag,
    CallerRole,
    Internships,
    InternshipsByCategory,
    CategoryCounts,
    CompanySubmissions,
    ContactSubmissions,
}

/// Cache key: resource plus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CallerProfile,
    AdminFlag,
    CallerRole,
    Internships,
    InternshipsByCategory(String),
    CategoryCounts,
    CompanySubmissions,
    ContactSubmissions,
}

impl QueryKey {
    pub fn resource(&self) -> Resource {
        match self {
            QueryKey::CallerProfile => Resource::CallerProfile,
            QueryKey::AdminFlag => Resource::AdminFlag,
            QueryKey::CallerRole => Resource::CallerRole,
            QueryKey::Internships => Resource::Internships,
            QueryKey::InternshipsByCategory(_) => Resource::InternshipsByCategory,
            QueryKey::CategoryCounts => Resource::CategoryCounts,
            QueryKey::CompanySubmissions => Resource::CompanySubmissions,
            QueryKey::ContactSubmissions => Resource::ContactSubmissions,
        }
    }

    /// Whether failed fetches may be retried transparently. Identity- and
    /// authorization-sensitive reads fail straight to `Error`.
    pub fn retries(&self) -> bool {
        matches!(
            self.resource(),
            Resource::Internships | Resource::InternshipsByCategory | Resource::CategoryCounts
        )
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::CallerProfile => f.write_str("caller-profile"),
            QueryKey::AdminFlag => f.write_str("admin-flag"),
            QueryKey::CallerRole => f.write_str("caller-role"),
            QueryKey::Internships => f.write_str("internships"),
            QueryKey::InternshipsByCategory(category) => {
                write!(f, "internships-by-category({category})")
            }
            QueryKey::CategoryCounts => f.write_str("category-counts"),
            QueryKey::CompanySubmissions => f.write_str("company-submissions"),
            QueryKey::ContactSubmissions => f.write_str("contact-submissions"),
        }
    }
}

/// A cached remote-read value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Profile(Option<UserProfile>),
    AdminFlag(bool),
    Role(Role),
    Internships(Vec<Internship>),
    CategoryCounts(Vec<CategoryCount>),
    CompanySubmissions(Vec<CompanySubmission>),
    ContactSubmissions(Vec<ContactFormSubmission>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl QueryStatus {
    /// Success or error.
    pub fn is_settled(self) -> bool {
        matches!(self, QueryStatus::Success | QueryStatus::Error)
    }
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    /// Last successful value. Kept across later failures and reloads.
    pub data: Option<Arc<QueryData>>,
    /// Error of the most recent settled fetch, if it failed.
    pub error: Option<RemoteError>,
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            stale: false,
            updated_at: None,
        }
    }
}

type Waiter = oneshot::Sender<Result<Arc<QueryData>, RemoteError>>;
type Observer = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

#[derive(Default)]
struct Slot {
    status: QueryStatus,
    data: Option<Arc<QueryData>>,
    error: Option<RemoteError>,
    stale: bool,
    /// Set when an invalidation lands while a fetch is in flight; the entry
    /// stays stale after that fetch settles.
    invalidated_while_loading: bool,
    updated_at: Option<DateTime<Utc>>,
    waiters: Vec<Waiter>,
}

impl Slot {
    fn snapshot(&self, key: &QueryKey) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            stale: self.stale,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<QueryKey, Slot>,
    observers: HashMap<QueryKey, Vec<(u64, Observer)>>,
    next_observer_id: u64,
    epoch: u64,
}

impl CacheInner {
    fn observers_of(&self, key: &QueryKey) -> Vec<Observer> {
        self.observers
            .get(key)
            .map(|list| list.iter().map(|(_, o)| o.clone()).collect())
            .unwrap_or_default()
    }

    fn is_observed(&self, key: &QueryKey) -> bool {
        self.observers.get(key).is_some_and(|list| !list.is_empty())
    }
}

/// Pending observer calls collected under the lock and run after it is
/// released.
#[derive(Default)]
struct Notifications(Vec<(Vec<Observer>, CacheEntry)>);

impl Notifications {
    fn push(&mut self, inner: &CacheInner, entry: CacheEntry) {
        let observers = inner.observers_of(&entry.key);
        if !observers.is_empty() {
            self.0.push((observers, entry));
        }
    }

    fn deliver(self) {
        for (observers, entry) in self.0 {
            for observer in observers {
                observer(&entry);
            }
        }
    }
}

enum Plan {
    Hit(Arc<QueryData>),
    Failed(RemoteError),
    Wait(oneshot::Receiver<Result<Arc<QueryData>, RemoteError>>),
    /// Wait for the in-flight fetch to finish, then plan again.
    Follow(oneshot::Receiver<Result<Arc<QueryData>, RemoteError>>),
    /// Fetch under the given epoch; the status is the one to restore if the
    /// fetch is abandoned.
    Lead(u64, QueryStatus),
}

/// Held by the task leading a fetch. If that task is dropped before it
/// settles, the slot goes back to its previous status, marked stale, and the
/// parked waiters receive [`QueryError::Discarded`].
struct LeadGuard<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    epoch: u64,
    previous: QueryStatus,
    armed: bool,
}

impl LeadGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut notes = Notifications::default();
        {
            let mut inner = self.cache.lock();
            if inner.epoch != self.epoch {
                return;
            }
            let Some(slot) = inner.entries.get_mut(self.key) else {
                return;
            };
            if slot.status != QueryStatus::Loading {
                return;
            }
            slot.status = self.previous;
            slot.stale = self.previous.is_settled();
            slot.invalidated_while_loading = false;
            // Dropping the senders wakes every waiter with a receive error.
            slot.waiters.clear();
            let entry = slot.snapshot(self.key);
            notes.push(&inner, entry);
        }
        debug!(key = %self.key, "Fetch abandoned by its caller");
        notes.deliver();
    }
}

/// Keyed store of remote-read results with single-flight fetches and
/// synchronous change notification.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    retry: RetryPolicy,
}

impl QueryCache {
    /// `retry` applies to keys whose [`QueryKey::retries`] is true.
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            retry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        lock(&self.inner)
    }

    /// Return the cached value for `key`, fetching it when the entry is idle
    /// or stale. A settled error is returned as-is until [`Self::refetch`].
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<QueryData>, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<QueryData, RemoteError>>,
    {
        self.load(key, fetcher, false).await
    }

    /// Fetch `key` even if a fresh value is cached. Joins an in-flight fetch
    /// instead of starting a second one, unless that fetch was invalidated
    /// after it started: then it is awaited and a new fetch follows.
    pub async fn refetch<F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
    ) -> Result<Arc<QueryData>, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<QueryData, RemoteError>>,
    {
        self.load(key, fetcher, true).await
    }

    async fn load<F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        force: bool,
    ) -> Result<Arc<QueryData>, QueryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<QueryData, RemoteError>>,
    {
        loop {
            let mut notes = Notifications::default();
            let plan = {
                let mut inner = self.lock();
                let epoch = inner.epoch;
                let slot = inner.entries.entry(key.clone()).or_default();
                let plan = match slot.status {
                    QueryStatus::Loading => {
                        let (tx, rx) = oneshot::channel();
                        slot.waiters.push(tx);
                        // The in-flight fetch predates a write; a forced read
                        // must see a fetch issued after it.
                        if force && slot.invalidated_while_loading {
                            Plan::Follow(rx)
                        } else {
                            Plan::Wait(rx)
                        }
                    }
                    QueryStatus::Success if !force && !slot.stale => match &slot.data {
                        Some(data) => Plan::Hit(data.clone()),
                        None => Plan::Lead(epoch, slot.status),
                    },
                    QueryStatus::Error if !force && !slot.stale => match &slot.error {
                        Some(err) => Plan::Failed(err.clone()),
                        None => Plan::Lead(epoch, slot.status),
                    },
                    previous => Plan::Lead(epoch, previous),
                };
                if let Plan::Lead(..) = plan {
                    slot.status = QueryStatus::Loading;
                    slot.invalidated_while_loading = false;
                    let entry = slot.snapshot(&key);
                    notes.push(&inner, entry);
                }
                plan
            };
            notes.deliver();

            match plan {
                Plan::Hit(data) => return Ok(data),
                Plan::Failed(err) => return Err(err.into()),
                Plan::Wait(rx) => {
                    return match rx.await {
                        Ok(result) => result.map_err(QueryError::from),
                        Err(_) => Err(QueryError::Discarded),
                    };
                }
                Plan::Follow(rx) => {
                    if rx.await.is_err() {
                        return Err(QueryError::Discarded);
                    }
                    debug!(%key, "Refetching after write landed mid-fetch");
                }
                Plan::Lead(epoch, previous) => {
                    debug!(%key, "Fetching");
                    let guard = LeadGuard {
                        cache: self,
                        key: &key,
                        epoch,
                        previous,
                        armed: true,
                    };
                    let result = self.run_with_retry(&key, &fetcher).await.map(Arc::new);
                    guard.disarm();
                    return self.settle(key, epoch, result);
                }
            }
        }
    }

    async fn run_with_retry<F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: &F,
    ) -> Result<QueryData, RemoteError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<QueryData, RemoteError>>,
    {
        let policy = if key.retries() {
            self.retry
        } else {
            RetryPolicy::disabled()
        };

        let mut attempt: u8 = 0;
        loop {
            match fetcher().await {
                Ok(data) => return Ok(data),
                Err(err) if attempt < policy.max_retries => {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    warn!(
                        %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn settle(
        &self,
        key: QueryKey,
        epoch: u64,
        result: Result<Arc<QueryData>, RemoteError>,
    ) -> Result<Arc<QueryData>, QueryError> {
        let mut notes = Notifications::default();
        let waiters = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                debug!(%key, "Discarding result fetched before cache flush");
                return Err(QueryError::Discarded);
            }
            let slot = inner.entries.entry(key.clone()).or_default();
            match &result {
                Ok(data) => {
                    slot.status = QueryStatus::Success;
                    slot.data = Some(data.clone());
                    slot.error = None;
                }
                Err(err) => {
                    slot.status = QueryStatus::Error;
                    slot.error = Some(err.clone());
                }
            }
            slot.stale = slot.invalidated_while_loading;
            slot.invalidated_while_loading = false;
            slot.updated_at = Some(Utc::now());
            let waiters = std::mem::take(&mut slot.waiters);
            let entry = slot.snapshot(&key);
            notes.push(&inner, entry);
            waiters
        };

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        notes.deliver();
        result.map_err(QueryError::from)
    }

    /// Mark every entry of `resources` stale and return the keys that
    /// currently have observers, which the caller is expected to refetch.
    pub(crate) fn invalidate(&self, resources: &[Resource]) -> Vec<QueryKey> {
        let mut notes = Notifications::default();
        let active = {
            let mut inner = self.lock();
            let mut touched = Vec::new();
            for (key, slot) in inner.entries.iter_mut() {
                if !resources.contains(&key.resource()) {
                    continue;
                }
                match slot.status {
                    QueryStatus::Idle => continue,
                    QueryStatus::Loading => slot.invalidated_while_loading = true,
                    QueryStatus::Success | QueryStatus::Error => slot.stale = true,
                }
                touched.push(slot.snapshot(key));
            }
            let mut active = Vec::new();
            for entry in touched {
                if inner.is_observed(&entry.key) {
                    active.push(entry.key.clone());
                }
                notes.push(&inner, entry);
            }
            active
        };
        notes.deliver();
        active
    }

    /// Drop every entry. In-flight fetches are discarded when they settle and
    /// their waiters receive [`QueryError::Discarded`]. Returns once the
    /// flush is complete.
    pub fn clear(&self) {
        let mut notes = Notifications::default();
        {
            let mut inner = self.lock();
            inner.epoch += 1;
            let keys: Vec<QueryKey> = inner.entries.drain().map(|(key, _)| key).collect();
            for key in keys {
                notes.push(&inner, CacheEntry::idle(key));
            }
        }
        debug!("Query cache flushed");
        notes.deliver();
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).map(|slot| slot.snapshot(key))
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.lock()
            .entries
            .get(key)
            .map(|slot| slot.status)
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Register `observer` for writes to `key`. It stays registered until the
    /// returned [`Subscription`] is dropped.
    pub fn subscribe(
        &self,
        key: QueryKey,
        observer: impl Fn(&CacheEntry) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.lock();
        inner.next_observer_id += 1;
        let id = inner.next_observer_id;
        inner
            .observers
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(observer)));
        Subscription {
            cache: Arc::downgrade(&self.inner),
            key,
            id,
        }
    }

    pub fn is_observed(&self, key: &QueryKey) -> bool {
        self.lock().is_observed(key)
    }
}

fn lock(inner: &Mutex<CacheInner>) -> MutexGuard<'_, CacheInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Observer registration. Dropping it unregisters the observer, so a view
/// that went away never sees later results.
pub struct Subscription {
    cache: Weak<Mutex<CacheInner>>,
    key: QueryKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.cache.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        if let Some(list) = inner.observers.get_mut(&self.key) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                inner.observers.remove(&self.key);
            }
        }
    }
}
