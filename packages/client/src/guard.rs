//! Route access decisions.
//!
//! [`evaluate`] is a pure function of the session phase, the caller-profile
//! read and the admin-flag read. [`AccessGuard`] feeds it from the cache and
//! re-evaluates whenever either read changes.

use std::sync::Arc;

use common::UserProfile;
use tracing::debug;

use crate::cache::{CacheEntry, QueryData, QueryKey, QueryStatus, Subscription};
use crate::queries;
use crate::roles::RoleResolver;
use crate::state::AppState;

/// Where an unauthenticated caller is sent once the guard has settled.
pub const LANDING_ROUTE: &str = "/";

/// Capabilities a route asks for. Admin is checked before company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirement {
    pub admin: bool,
    pub company: bool,
}

impl Requirement {
    pub const OPEN: Requirement = Requirement {
        admin: false,
        company: false,
    };
    pub const ADMIN: Requirement = Requirement {
        admin: true,
        company: false,
    };
    pub const COMPANY: Requirement = Requirement {
        admin: false,
        company: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAdmin,
    NotCompany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Unauthenticated,
    AuthenticatedNoProfile,
    AuthenticatedWithProfile,
    Denied(DenyReason),
}

impl GuardState {
    /// Route to navigate to, if any. Only a settled `Unauthenticated`
    /// redirects; `Loading` never does.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            GuardState::Unauthenticated => Some(LANDING_ROUTE),
            _ => None,
        }
    }

    pub fn renders_content(&self) -> bool {
        matches!(self, GuardState::AuthenticatedWithProfile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Sign-in handshake in progress.
    Establishing,
    SignedOut,
    SignedIn,
}

/// Outcome of one cached read as seen by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadState<T> {
    Pending,
    Ready(T),
    Failed,
}

impl<T> ReadState<T> {
    fn is_pending(&self) -> bool {
        matches!(self, ReadState::Pending)
    }
}

pub fn evaluate(
    session: SessionPhase,
    profile: &ReadState<Option<UserProfile>>,
    admin: &ReadState<bool>,
    requirement: Requirement,
) -> GuardState {
    match session {
        SessionPhase::Establishing => return GuardState::Loading,
        SessionPhase::SignedOut => return GuardState::Unauthenticated,
        SessionPhase::SignedIn => {}
    }
    if profile.is_pending() || admin.is_pending() {
        return GuardState::Loading;
    }

    // A failed profile read is not an absent profile: the setup prompt is
    // reserved for a confirmed absence.
    let profile = match profile {
        ReadState::Ready(None) => return GuardState::AuthenticatedNoProfile,
        ReadState::Ready(Some(profile)) => Some(profile),
        ReadState::Failed | ReadState::Pending => None,
    };

    if requirement.admin && *admin != ReadState::Ready(true) {
        return GuardState::Denied(DenyReason::NotAdmin);
    }
    if requirement.company && !profile.is_some_and(UserProfile::is_company) {
        return GuardState::Denied(DenyReason::NotCompany);
    }
    GuardState::AuthenticatedWithProfile
}

fn read_state(entry: Option<CacheEntry>) -> ReadState<Arc<QueryData>> {
    let Some(entry) = entry else {
        return ReadState::Pending;
    };
    match (entry.status, entry.data) {
        (QueryStatus::Error, _) => ReadState::Failed,
        (QueryStatus::Success, Some(data)) => ReadState::Ready(data),
        // A refetch in progress keeps showing the last settled value.
        (QueryStatus::Loading, Some(data)) if entry.updated_at.is_some() => {
            ReadState::Ready(data)
        }
        _ => ReadState::Pending,
    }
}

/// Guard for one route.
#[derive(Clone)]
pub struct AccessGuard {
    state: AppState,
    requirement: Requirement,
}

impl AccessGuard {
    pub fn new(state: AppState, requirement: Requirement) -> Self {
        Self { state, requirement }
    }

    fn phase(&self) -> SessionPhase {
        if self.state.session.is_authenticated() {
            SessionPhase::SignedIn
        } else if self.state.session.is_establishing() {
            SessionPhase::Establishing
        } else {
            SessionPhase::SignedOut
        }
    }

    /// Evaluate against whatever the cache holds right now, without fetching.
    pub fn snapshot(&self) -> GuardState {
        let cache = &self.state.cache;
        let profile = match read_state(cache.entry(&QueryKey::CallerProfile)) {
            ReadState::Ready(data) => match &*data {
                QueryData::Profile(profile) => ReadState::Ready(profile.clone()),
                _ => ReadState::Failed,
            },
            ReadState::Pending => ReadState::Pending,
            ReadState::Failed => ReadState::Failed,
        };
        let admin = match read_state(cache.entry(&QueryKey::AdminFlag)) {
            ReadState::Ready(data) => match &*data {
                QueryData::AdminFlag(flag) => ReadState::Ready(*flag),
                _ => ReadState::Failed,
            },
            ReadState::Pending => ReadState::Pending,
            ReadState::Failed => ReadState::Failed,
        };
        evaluate(self.phase(), &profile, &admin, self.requirement)
    }

    /// Issue both reads, wait for them to settle, then evaluate.
    pub async fn resolve(&self) -> GuardState {
        let phase = self.phase();
        if phase != SessionPhase::SignedIn {
            return evaluate(phase, &ReadState::Pending, &ReadState::Pending, self.requirement);
        }
        let roles = RoleResolver::new(&self.state);
        let (profile, admin) =
            tokio::join!(queries::caller_profile(&self.state), roles.is_admin());
        let profile = profile.map_or(ReadState::Failed, ReadState::Ready);
        let admin = admin.map_or(ReadState::Failed, ReadState::Ready);
        let decided = evaluate(self.phase(), &profile, &admin, self.requirement);
        debug!(?decided, requirement = ?self.requirement, "Access evaluated");
        decided
    }

    /// True once per session, when the caller has no profile yet and the
    /// setup prompt has not been shown.
    pub fn take_profile_setup_prompt(&self, decided: GuardState) -> bool {
        decided == GuardState::AuthenticatedNoProfile && self.state.session.claim_profile_setup()
    }

    /// Call `on_change` with a fresh evaluation every time either input read
    /// is written. Dropping the returned watch stops the calls.
    pub fn watch(&self, on_change: impl Fn(GuardState) + Send + Sync + 'static) -> GuardWatch {
        let on_change = Arc::new(on_change);
        let subscriptions = [QueryKey::CallerProfile, QueryKey::AdminFlag]
            .into_iter()
            .map(|key| {
                let guard = self.clone();
                let on_change = on_change.clone();
                self.state
                    .cache
                    .subscribe(key, move |_| on_change(guard.snapshot()))
            })
            .collect();
        GuardWatch {
            _subscriptions: subscriptions,
        }
    }
}

/// Keeps a [`AccessGuard::watch`] registration alive.
pub struct GuardWatch {
    _subscriptions: Vec<Subscription>,
}
