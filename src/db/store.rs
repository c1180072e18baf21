use crate::error::AppError;
use crate::models::{
    activity::{Activity, VoteReceipt},
    itinerary::Itinerary,
    trip::Trip,
    user::UserProfile,
};

/// Persistence seam handed to every service.
///
/// Vote mutations must be applied as one atomic read-modify-write of the
/// activity record. Trip membership lists are only changed through the
/// targeted operations below, never by rewriting the whole trip. Profiles
/// are saved with a version check.
#[allow(async_fn_in_trait)]
pub trait TripStore {
    /// Short description of the backend once it answers.
    async fn ping(&self) -> Result<String, AppError>;

    async fn insert_trip(&self, trip: &Trip) -> Result<(), AppError>;
    async fn get_trip(&self, trip_id: &str) -> Result<Option<Trip>, AppError>;
    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError>;
    /// Writes the editable trip details; membership lists are left as stored.
    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError>;
    /// Adds addresses to `invited_emails`, skipping ones already present.
    async fn add_invitations(
        &self,
        trip_id: &str,
        emails: &[String],
    ) -> Result<Option<Trip>, AppError>;
    /// Moves an invited address into `participant_ids` as `user_id`. Returns
    /// `None` when the trip is gone or the address is no longer invited.
    async fn add_participant(
        &self,
        trip_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Trip>, AppError>;
    async fn remove_participant(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> Result<Option<Trip>, AppError>;
    /// Removes the trip together with its activities and itinerary.
    async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError>;

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError>;
    async fn insert_activities(&self, activities: &[Activity]) -> Result<(), AppError>;
    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError>;
    async fn trip_activities(&self, trip_id: &str) -> Result<Vec<Activity>, AppError>;
    async fn shared_activities(&self, location_key: &str) -> Result<Vec<Activity>, AppError>;
    /// Returns the trip's copy of `shared`, creating it on first use.
    async fn adopt_shared_activity(
        &self,
        trip_id: &str,
        shared: &Activity,
    ) -> Result<Activity, AppError>;
    /// The outcome reflects the record as the write found it.
    async fn record_vote(
        &self,
        activity_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<Option<VoteReceipt>, AppError>;
    async fn retract_vote(
        &self,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<Activity>, AppError>;
    async fn update_activity_details(
        &self,
        activity_id: &str,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Result<Option<Activity>, AppError>;
    /// Deletes shared records, for one location or all of them.
    async fn clear_shared_activities(&self, location_key: Option<&str>) -> Result<u64, AppError>;

    async fn get_itinerary(&self, trip_id: &str) -> Result<Option<Itinerary>, AppError>;
    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError>;
    async fn insert_user(&self, user: &UserProfile) -> Result<(), AppError>;
    /// Stores `user` as version `user.version + 1`, or fails with
    /// `Conflict` when the stored profile is no longer at `user.version`.
    async fn save_user(&self, user: &UserProfile) -> Result<(), AppError>;
}
