use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Student,
    Company,
}

/// The caller's self-chosen profile. Exactly one per identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub account_type: AccountType,
}

impl UserProfile {
    pub fn is_company(&self) -> bool {
        self.account_type == AccountType::Company
    }
}
