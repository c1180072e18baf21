use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: String,
    /// `None` marks a shared local-discovery record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub location_key: String,
    /// Set on a trip-local copy of a shared record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_id: Option<String>,
    pub name: String,
    pub location: String,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub votes: BTreeMap<String, bool>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub dislikes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Recorded,
    Changed,
    Unchanged,
}

impl Activity {
    /// Applies one user's vote, keeping the counters in step with the map.
    pub fn record_vote(&mut self, user_id: &str, liked: bool) -> VoteOutcome {
        match self.votes.insert(user_id.to_string(), liked) {
            None => {
                if liked {
                    self.likes += 1;
                } else {
                    self.dislikes += 1;
                }
                VoteOutcome::Recorded
            }
            Some(previous) if previous == liked => VoteOutcome::Unchanged,
            Some(_) => {
                if liked {
                    self.likes += 1;
                    self.dislikes = self.dislikes.saturating_sub(1);
                } else {
                    self.dislikes += 1;
                    self.likes = self.likes.saturating_sub(1);
                }
                VoteOutcome::Changed
            }
        }
    }

    /// Returns whether a vote was removed.
    pub fn retract_vote(&mut self, user_id: &str) -> bool {
        match self.votes.remove(user_id) {
            Some(true) => {
                self.likes = self.likes.saturating_sub(1);
                true
            }
            Some(false) => {
                self.dislikes = self.dislikes.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    /// Likes and dislikes as counted from the vote map.
    pub fn tally(&self) -> (u32, u32) {
        self.votes.values().fold((0, 0), |(likes, dislikes), liked| {
            if *liked {
                (likes + 1, dislikes)
            } else {
                (likes, dislikes + 1)
            }
        })
    }

    pub fn counts_consistent(&self) -> bool {
        self.tally() == (self.likes, self.dislikes)
    }

    /// Fresh trip-local copy of a shared record, votes not carried over.
    pub fn adopt_into(&self, trip_id: &str) -> Activity {
        let now = Utc::now();
        Activity {
            id: ObjectId::new().to_hex(),
            trip_id: Some(trip_id.to_string()),
            discovery_id: Some(self.id.clone()),
            votes: BTreeMap::new(),
            likes: 0,
            dislikes: 0,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewActivity {
    pub name: String,
    pub location: String,
    pub duration_minutes: u32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub source_url: Option<String>,
}

impl NewActivity {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Activity name is required.".to_string()));
        }
        if self.location.trim().is_empty() {
            return Err(AppError::Validation(
                "Activity location is required.".to_string(),
            ));
        }
        if self.duration_minutes == 0 {
            return Err(AppError::Validation(
                "Activity duration must be at least one minute.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_activity(
        self,
        trip_id: Option<&str>,
        location_key: &str,
        created_by: Option<&str>,
    ) -> Activity {
        let now = Utc::now();
        Activity {
            id: ObjectId::new().to_hex(),
            trip_id: trip_id.map(str::to_string),
            location_key: location_key.to_string(),
            discovery_id: None,
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
            duration_minutes: self.duration_minutes,
            description: self.description.filter(|d| !d.trim().is_empty()),
            category: self.category.filter(|c| !c.trim().is_empty()),
            image_url: None,
            source_url: self.source_url,
            votes: BTreeMap::new(),
            likes: 0,
            dislikes: 0,
            created_by: created_by.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct VoteInput {
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    pub activity: Activity,
}

/// Lower-cased, whitespace-collapsed key shared records are grouped under.
pub fn location_key(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity() -> Activity {
        NewActivity {
            name: "Tram 28".to_string(),
            location: "Lisbon".to_string(),
            duration_minutes: 90,
            description: None,
            category: Some("Sightseeing".to_string()),
            source_url: None,
        }
        .into_activity(Some("trip-1"), "lisbon", Some("u1"))
    }

    #[test]
    fn first_vote_increments_one_counter() {
        let mut a = activity();
        assert_eq!(a.record_vote("u1", true), VoteOutcome::Recorded);
        assert_eq!(a.record_vote("u2", false), VoteOutcome::Recorded);
        assert_eq!((a.likes, a.dislikes), (1, 1));
        assert!(a.counts_consistent());
    }

    #[test]
    fn repeating_a_vote_is_a_no_op() {
        let mut a = activity();
        a.record_vote("u1", true);
        assert_eq!(a.record_vote("u1", true), VoteOutcome::Unchanged);
        assert_eq!((a.likes, a.dislikes), (1, 0));
    }

    #[test]
    fn changing_a_vote_moves_one_count() {
        let mut a = activity();
        a.record_vote("u1", true);
        a.record_vote("u2", true);
        assert_eq!(a.record_vote("u1", false), VoteOutcome::Changed);
        assert_eq!((a.likes, a.dislikes), (1, 1));
        assert!(a.counts_consistent());
    }

    #[test]
    fn retracting_restores_counts() {
        let mut a = activity();
        a.record_vote("u1", false);
        assert!(a.retract_vote("u1"));
        assert!(!a.retract_vote("u1"));
        assert_eq!((a.likes, a.dislikes), (0, 0));
        assert!(a.votes.is_empty());
    }

    #[test]
    fn counts_track_the_map_through_a_sequence() {
        let mut a = activity();
        let script = [
            ("u1", true),
            ("u2", false),
            ("u1", false),
            ("u3", true),
            ("u2", true),
            ("u2", true),
        ];
        for (user, liked) in script {
            a.record_vote(user, liked);
            assert!(a.counts_consistent());
        }
        assert_eq!(a.likes + a.dislikes, a.votes.len() as u32);
    }

    #[test]
    fn adopted_copy_points_back_and_starts_unvoted() {
        let mut shared = activity();
        shared.trip_id = None;
        shared.record_vote("u9", true);
        let copy = shared.adopt_into("trip-2");
        assert_eq!(copy.discovery_id.as_deref(), Some(shared.id.as_str()));
        assert_eq!(copy.trip_id.as_deref(), Some("trip-2"));
        assert_ne!(copy.id, shared.id);
        assert_eq!(copy.likes, 0);
        assert!(copy.votes.is_empty());
    }

    #[test]
    fn location_keys_are_normalised() {
        assert_eq!(location_key("  New   York City "), "new york city");
    }

    #[test]
    fn zero_duration_is_invalid() {
        let input = NewActivity {
            name: "Nap".to_string(),
            location: "Hotel".to_string(),
            duration_minutes: 0,
            description: None,
            category: None,
            source_url: None,
        };
        assert!(input.validate().is_err());
    }
}
