use common::{AccountType, Role};

use crate::cache::{QueryData, QueryKey};
use crate::error::QueryError;
use crate::queries;
use crate::state::AppState;

/// Cached view of what the remote authority says the caller may do.
///
/// Values are only ever read from the authority; nothing here decides a role
/// locally. Signed-out callers are a guest without admin rights.
pub struct RoleResolver<'a> {
    state: &'a AppState,
}

impl<'a> RoleResolver<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn is_admin(&self) -> Result<bool, QueryError> {
        if !self.state.session.is_authenticated() {
            return Ok(false);
        }
        let key = QueryKey::AdminFlag;
        match &*queries::read(self.state, &key).await? {
            QueryData::AdminFlag(flag) => Ok(*flag),
            _ => Err(QueryError::UnexpectedShape(key)),
        }
    }

    pub async fn caller_role(&self) -> Result<Role, QueryError> {
        if !self.state.session.is_authenticated() {
            return Ok(Role::Guest);
        }
        let key = QueryKey::CallerRole;
        match &*queries::read(self.state, &key).await? {
            QueryData::Role(role) => Ok(*role),
            _ => Err(QueryError::UnexpectedShape(key)),
        }
    }

    /// `None` until the caller has saved a profile.
    pub async fn account_type(&self) -> Result<Option<AccountType>, QueryError> {
        Ok(queries::caller_profile(self.state)
            .await?
            .map(|profile| profile.account_type))
    }
}
