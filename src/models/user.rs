use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

/// One side's view of a partner or friend request.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConnectionRequest {
    pub direction: RequestDirection,
    pub counterpart_id: String,
    pub counterpart_name: String,
    pub counterpart_email: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub friend_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_request: Option<ConnectionRequest>,
    #[serde(default)]
    pub friend_requests: Vec<ConnectionRequest>,
    /// Bumped by the store on every save; a save carrying an older value is refused.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: &str, name: &str, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: normalize_email(email),
            bio: None,
            interests: Vec::new(),
            partner_id: None,
            friend_ids: Vec::new(),
            partner_request: None,
            friend_requests: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn apply(self, profile: &mut UserProfile) -> Result<(), AppError> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Name cannot be empty.".to_string()));
            }
            profile.name = name.trim().to_string();
        }
        if let Some(bio) = self.bio {
            profile.bio = Some(bio.trim().to_string()).filter(|b| !b.is_empty());
        }
        if let Some(interests) = self.interests {
            profile.interests = interests
                .into_iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect();
        }
        profile.touch();
        Ok(())
    }
}

/// What another user sees of a profile.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
}

impl From<UserProfile> for PublicProfile {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            bio: profile.bio,
            interests: profile.interests,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
        })
        .is_match(email.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_checked_and_normalised() {
        assert!(is_valid_email("sam@example.com"));
        assert!(is_valid_email("  sam.k+trips@mail.example.org "));
        assert!(!is_valid_email("sam@example"));
        assert!(!is_valid_email("sam example.com"));
        assert_eq!(normalize_email(" Sam@Example.COM "), "sam@example.com");
    }

    #[test]
    fn profile_update_drops_blank_interests() {
        let mut profile = UserProfile::new("u1", "Sam", "sam@example.com");
        ProfileUpdate {
            bio: Some("  ".to_string()),
            interests: Some(vec!["hiking".to_string(), " ".to_string()]),
            ..Default::default()
        }
        .apply(&mut profile)
        .unwrap();
        assert_eq!(profile.bio, None);
        assert_eq!(profile.interests, vec!["hiking".to_string()]);
    }
}
