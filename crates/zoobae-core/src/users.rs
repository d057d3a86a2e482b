//! User directory: the account/profile collaborator, kept to what the conversation core needs.
//!
//! The bearer token is the registered e-mail (no password or session handling here).

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const USERS_TREE: &str = "users";
const USERS_BY_EMAIL_TREE: &str = "users_by_email";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub profile_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile metadata the orchestrator folds into the responder context.
pub trait ProfileLookup: Send + Sync {
    /// `None` when the user has no profile yet.
    fn profile_name(&self, user_id: &str) -> CoreResult<Option<String>>;
}

pub struct UserDirectory {
    users: sled::Tree,
    by_email: sled::Tree,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserDirectory {
    pub fn from_db(db: &sled::Db) -> CoreResult<Self> {
        Ok(Self {
            users: db.open_tree(USERS_TREE)?,
            by_email: db.open_tree(USERS_BY_EMAIL_TREE)?,
        })
    }

    /// Register a new account. Duplicate e-mails are rejected.
    pub fn register(&self, email: &str, profile_name: Option<&str>) -> CoreResult<UserRecord> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(CoreError::InvalidInput("email must not be empty".to_string()));
        }
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            profile_name: profile_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            is_active: true,
            created_at: Utc::now(),
        };
        // Claim the e-mail atomically before writing the record.
        let claimed = self
            .by_email
            .compare_and_swap(email.as_bytes(), None as Option<&[u8]>, Some(record.id.as_bytes()))?;
        if claimed.is_err() {
            return Err(CoreError::DuplicateUser(email));
        }
        self.users
            .insert(record.id.as_bytes(), serde_json::to_vec(&record)?)?;
        tracing::info!(target: "zoobae::users", user_id = %record.id, "user registered");
        Ok(record)
    }

    pub fn find_by_id(&self, user_id: &str) -> CoreResult<Option<UserRecord>> {
        match self.users.get(user_id.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    /// Resolve a bearer token (the e-mail) to its user.
    pub fn find_by_email(&self, email: &str) -> CoreResult<Option<UserRecord>> {
        let email = normalize_email(email);
        let Some(id) = self.by_email.get(email.as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id).into_owned();
        self.find_by_id(&id)
    }

    /// Replace the profile name. A blank name clears it.
    pub fn set_profile_name(&self, user_id: &str, name: &str) -> CoreResult<UserRecord> {
        let mut record = self.find_by_id(user_id)?.ok_or(CoreError::UserNotFound)?;
        record.profile_name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        self.users
            .insert(record.id.as_bytes(), serde_json::to_vec(&record)?)?;
        Ok(record)
    }
}

impl ProfileLookup for UserDirectory {
    fn profile_name(&self, user_id: &str) -> CoreResult<Option<String>> {
        Ok(self.find_by_id(user_id)?.and_then(|u| u.profile_name))
    }
}
