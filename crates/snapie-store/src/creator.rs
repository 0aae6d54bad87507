//! # Creator Accounts
//!
//! Upload permission lives on the creator account. Unknown users are
//! allowed and get an account created lazily with default permissions.

use serde::{Deserialize, Serialize};

use snapie_core::{Timestamp, Username};

/// A user that has uploaded, or been moderated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorAccount {
    pub username: Username,
    pub banned: bool,
    pub can_upload: bool,
    pub verified: bool,
    pub joined: Timestamp,
}

impl CreatorAccount {
    /// Defaults for a lazily created account.
    pub fn new_default(username: Username, now: Timestamp) -> Self {
        Self {
            username,
            banned: false,
            can_upload: true,
            verified: false,
            joined: now,
        }
    }

    /// Ban or unban. Upload permission follows the ban flag.
    pub fn set_banned(&mut self, banned: bool) {
        self.banned = banned;
        self.can_upload = !banned;
    }
}

/// Outcome of an upload permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPermission {
    /// Known account with upload rights.
    Allowed,
    /// No account yet; allowed, and the caller creates one before pinning.
    NewUser,
    /// Rejected, with the reason shown to the client.
    Denied(&'static str),
}

impl UploadPermission {
    /// Evaluate an account looked up by username.
    pub fn for_account(account: Option<&CreatorAccount>) -> Self {
        match account {
            None => Self::NewUser,
            Some(a) if a.banned => Self::Denied("User is banned from uploading"),
            Some(a) if !a.can_upload => Self::Denied("User does not have upload permissions"),
            Some(_) => Self::Allowed,
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

/// Admin user listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorQuery {
    /// 1-based.
    pub page: i64,
    pub limit: i64,
    /// Case-insensitive substring of the username.
    pub search: Option<String>,
    pub banned: Option<bool>,
}

impl Default for CreatorQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
            search: None,
            banned: None,
        }
    }
}

impl CreatorQuery {
    /// Rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(1))
    }

    pub(crate) fn matches(&self, account: &CreatorAccount) -> bool {
        let search_ok = match self.search.as_deref().filter(|s| !s.is_empty()) {
            Some(needle) => account
                .username
                .as_str()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        };
        search_ok && self.banned.map_or(true, |b| account.banned == b)
    }
}

/// One page of creators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorPage {
    pub users: Vec<CreatorAccount>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(query: &CreatorQuery, total: i64) -> Self {
        let limit = query.limit.max(1);
        Self {
            page: query.page.max(1),
            limit,
            total,
            pages: if total <= 0 { 0 } else { (total - 1) / limit + 1 },
        }
    }
}
