use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::models::{
    activity::{Activity, VoteReceipt},
    itinerary::Itinerary,
    trip::Trip,
    user::UserProfile,
};

#[derive(Default)]
struct Collections {
    trips: HashMap<String, Trip>,
    activities: HashMap<String, Activity>,
    itineraries: HashMap<String, Itinerary>,
    users: HashMap<String, UserProfile>,
}

/// Process-local store used by tests and by runs without `MONGODB_URI`.
///
/// A single write lock around each mutation gives the same atomicity the
/// MongoDB store gets from single-document updates.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn stale_profile(user_id: &str) -> AppError {
    log::warn!("Refused stale write to profile {}", user_id);
    AppError::Conflict(
        "The profile was changed by another request. Please try again.".to_string(),
    )
}

fn sorted_by_creation(mut activities: Vec<Activity>) -> Vec<Activity> {
    activities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    activities
}

impl TripStore for MemoryStore {
    async fn ping(&self) -> Result<String, AppError> {
        let data = self.inner.read().await;
        Ok(format!(
            "In-memory store ({} trips, {} users); data is lost on restart",
            data.trips.len(),
            data.users.len()
        ))
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        if data.trips.contains_key(&trip.id) {
            return Err(AppError::Conflict("Trip already exists.".to_string()));
        }
        data.trips.insert(trip.id.clone(), trip.clone());
        Ok(())
    }

    async fn get_trip(&self, trip_id: &str) -> Result<Option<Trip>, AppError> {
        Ok(self.inner.read().await.trips.get(trip_id).cloned())
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        let data = self.inner.read().await;
        let mut trips: Vec<Trip> = data
            .trips
            .values()
            .filter(|trip| trip.participant_ids.iter().any(|id| id == user_id))
            .cloned()
            .collect();
        trips.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(trips)
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        let existing = data
            .trips
            .get_mut(&trip.id)
            .ok_or_else(|| AppError::NotFound("Trip not found.".to_string()))?;
        existing.name = trip.name.clone();
        existing.destination = trip.destination.clone();
        existing.start_date = trip.start_date;
        existing.end_date = trip.end_date;
        existing.latitude = trip.latitude;
        existing.longitude = trip.longitude;
        existing.place_id = trip.place_id.clone();
        existing.itinerary_rule = trip.itinerary_rule;
        existing.updated_at = trip.updated_at;
        Ok(())
    }

    async fn add_invitations(
        &self,
        trip_id: &str,
        emails: &[String],
    ) -> Result<Option<Trip>, AppError> {
        let mut data = self.inner.write().await;
        Ok(data.trips.get_mut(trip_id).map(|trip| {
            for email in emails {
                if !trip.invited_emails.contains(email) {
                    trip.invited_emails.push(email.clone());
                }
            }
            trip.updated_at = Utc::now();
            trip.clone()
        }))
    }

    async fn add_participant(
        &self,
        trip_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Trip>, AppError> {
        let mut data = self.inner.write().await;
        let trip = match data.trips.get_mut(trip_id) {
            Some(trip) if trip.invited_emails.iter().any(|invited| invited == email) => trip,
            _ => return Ok(None),
        };
        trip.invited_emails.retain(|invited| invited != email);
        if !trip.participant_ids.iter().any(|id| id == user_id) {
            trip.participant_ids.push(user_id.to_string());
        }
        trip.updated_at = Utc::now();
        Ok(Some(trip.clone()))
    }

    async fn remove_participant(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> Result<Option<Trip>, AppError> {
        let mut data = self.inner.write().await;
        Ok(data.trips.get_mut(trip_id).map(|trip| {
            trip.participant_ids.retain(|id| id != user_id);
            trip.updated_at = Utc::now();
            trip.clone()
        }))
    }

    async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        data.activities
            .retain(|_, activity| activity.trip_id.as_deref() != Some(trip_id));
        data.itineraries.remove(trip_id);
        data.trips.remove(trip_id);
        Ok(())
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .activities
            .insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn insert_activities(&self, activities: &[Activity]) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        for activity in activities {
            data.activities.insert(activity.id.clone(), activity.clone());
        }
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        Ok(self.inner.read().await.activities.get(activity_id).cloned())
    }

    async fn trip_activities(&self, trip_id: &str) -> Result<Vec<Activity>, AppError> {
        let data = self.inner.read().await;
        Ok(sorted_by_creation(
            data.activities
                .values()
                .filter(|activity| activity.trip_id.as_deref() == Some(trip_id))
                .cloned()
                .collect(),
        ))
    }

    async fn shared_activities(&self, location_key: &str) -> Result<Vec<Activity>, AppError> {
        let data = self.inner.read().await;
        Ok(sorted_by_creation(
            data.activities
                .values()
                .filter(|activity| {
                    activity.trip_id.is_none() && activity.location_key == location_key
                })
                .cloned()
                .collect(),
        ))
    }

    async fn adopt_shared_activity(
        &self,
        trip_id: &str,
        shared: &Activity,
    ) -> Result<Activity, AppError> {
        let mut data = self.inner.write().await;
        let existing = data.activities.values().find(|activity| {
            activity.trip_id.as_deref() == Some(trip_id)
                && activity.discovery_id.as_deref() == Some(shared.id.as_str())
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }

        let copy = shared.adopt_into(trip_id);
        data.activities.insert(copy.id.clone(), copy.clone());
        Ok(copy)
    }

    async fn record_vote(
        &self,
        activity_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<Option<VoteReceipt>, AppError> {
        let mut data = self.inner.write().await;
        Ok(data.activities.get_mut(activity_id).map(|activity| {
            let outcome = activity.record_vote(user_id, liked);
            activity.updated_at = Utc::now();
            VoteReceipt {
                outcome,
                activity: activity.clone(),
            }
        }))
    }

    async fn retract_vote(
        &self,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        let mut data = self.inner.write().await;
        Ok(data.activities.get_mut(activity_id).map(|activity| {
            if activity.retract_vote(user_id) {
                activity.updated_at = Utc::now();
            }
            activity.clone()
        }))
    }

    async fn update_activity_details(
        &self,
        activity_id: &str,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Result<Option<Activity>, AppError> {
        let mut data = self.inner.write().await;
        Ok(data.activities.get_mut(activity_id).map(|activity| {
            if description.is_some() {
                activity.description = description;
            }
            if image_url.is_some() {
                activity.image_url = image_url;
            }
            activity.updated_at = Utc::now();
            activity.clone()
        }))
    }

    async fn clear_shared_activities(&self, location_key: Option<&str>) -> Result<u64, AppError> {
        let mut data = self.inner.write().await;
        let before = data.activities.len();
        data.activities.retain(|_, activity| {
            let shared = activity.trip_id.is_none();
            let in_scope = location_key.map_or(true, |key| activity.location_key == key);
            !(shared && in_scope)
        });
        Ok((before - data.activities.len()) as u64)
    }

    async fn get_itinerary(&self, trip_id: &str) -> Result<Option<Itinerary>, AppError> {
        Ok(self.inner.read().await.itineraries.get(trip_id).cloned())
    }

    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError> {
        self.inner
            .write()
            .await
            .itineraries
            .insert(itinerary.trip_id.clone(), itinerary.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        let data = self.inner.read().await;
        Ok(data.users.values().find(|user| user.email == email).cloned())
    }

    async fn insert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        if data.users.contains_key(&user.id) {
            return Err(AppError::Conflict("Profile already exists.".to_string()));
        }
        data.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), AppError> {
        let mut data = self.inner.write().await;
        let existing = data
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
        if existing.version != user.version {
            return Err(stale_profile(&user.id));
        }
        *existing = UserProfile {
            version: user.version + 1,
            ..user.clone()
        };
        Ok(())
    }
}
