use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Bson, Document},
    options::{ClientOptions, IndexOptions, ReturnDocument, ServerApi, ServerApiVersion},
    Client, Collection, Database, IndexModel,
};
use std::time::Duration;

use crate::db::memory::stale_profile;
use crate::db::store::TripStore;
use crate::error::AppError;
use crate::models::{
    activity::{Activity, VoteReceipt},
    itinerary::Itinerary,
    trip::Trip,
    user::UserProfile,
};

const TRIPS: &str = "trips";
const USERS: &str = "users";
const ACTIVITIES: &str = "activities";
const ITINERARIES: &str = "itineraries";

pub async fn create_mongo_client(uri: &str) -> Result<Client, AppError> {
    log::info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;

    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    match client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await
    {
        Ok(_) => log::info!("Successfully connected to MongoDB and verified with ping command"),
        Err(e) => {
            log::warn!("Connected to MongoDB but ping test failed: {}", e);
            log::warn!("The API may still work, but some functionality might be impaired");
        }
    }

    Ok(client)
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            db: client.database(database),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn trips(&self) -> Collection<Trip> {
        self.db.collection(TRIPS)
    }

    fn users(&self) -> Collection<UserProfile> {
        self.db.collection(USERS)
    }

    fn activities(&self) -> Collection<Activity> {
        self.db.collection(ACTIVITIES)
    }

    fn itineraries(&self) -> Collection<Itinerary> {
        self.db.collection(ITINERARIES)
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let adopted_once = IndexModel::builder()
            .keys(doc! { "trip_id": 1, "discovery_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "discovery_id": { "$exists": true } })
                    .build(),
            )
            .build();
        self.activities().create_index(adopted_once).await?;

        let by_location = IndexModel::builder()
            .keys(doc! { "location_key": 1, "trip_id": 1 })
            .build();
        self.activities().create_index(by_location).await?;

        let by_member = IndexModel::builder()
            .keys(doc! { "participant_ids": 1 })
            .build();
        self.trips().create_index(by_member).await?;

        let by_email = IndexModel::builder().keys(doc! { "email": 1 }).build();
        self.users().create_index(by_email).await?;

        log::info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn update_votes(
        &self,
        activity_id: &str,
        votes_stage: Document,
        returning: ReturnDocument,
    ) -> Result<Option<Activity>, AppError> {
        // Both counters are recomputed from the map inside the same update.
        let pipeline = vec![
            votes_stage,
            doc! {
                "$set": {
                    "likes": count_votes(true),
                    "dislikes": count_votes(false),
                }
            },
        ];

        let updated = self
            .activities()
            .find_one_and_update(doc! { "_id": activity_id }, pipeline)
            .return_document(returning)
            .await?;
        Ok(updated)
    }

    async fn update_trip(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<Option<Trip>, AppError> {
        Ok(self
            .trips()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?)
    }
}

fn count_votes(liked: bool) -> Document {
    doc! {
        "$size": {
            "$filter": {
                "input": { "$objectToArray": { "$ifNull": ["$votes", {}] } },
                "cond": { "$eq": ["$$this.v", liked] }
            }
        }
    }
}

fn now_bson() -> Result<Bson, AppError> {
    time_bson(&Utc::now())
}

fn time_bson(at: &DateTime<Utc>) -> Result<Bson, AppError> {
    Ok(bson::to_bson(at)?)
}

/// Matches a stored version; profiles written before versioning have none.
fn version_filter(version: u64) -> Bson {
    if version == 0 {
        Bson::Document(doc! { "$in": [0_i64, Bson::Null] })
    } else {
        Bson::Int64(version as i64)
    }
}

/// `{user_id: liked}` for `$mergeObjects`; the value is literal so a bare
/// boolean is never read as an expression.
fn ballot(user_id: &str, liked: bool) -> Document {
    let mut ballot = Document::new();
    ballot.insert(user_id, doc! { "$literal": liked });
    ballot
}

/// Vote map keys become field names, so they must be plain.
fn check_vote_key(user_id: &str) -> Result<(), AppError> {
    if user_id.is_empty() || user_id.contains('.') || user_id.starts_with('$') {
        return Err(AppError::Validation(format!(
            "'{}' cannot be used as a voter id.",
            user_id
        )));
    }
    Ok(())
}

impl TripStore for MongoStore {
    async fn ping(&self) -> Result<String, AppError> {
        self.db.run_command(doc! {"ping": 1}).await?;
        Ok(format!("Connected to MongoDB database '{}'", self.db.name()))
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<(), AppError> {
        self.trips().insert_one(trip).await?;
        Ok(())
    }

    async fn get_trip(&self, trip_id: &str) -> Result<Option<Trip>, AppError> {
        Ok(self.trips().find_one(doc! { "_id": trip_id }).await?)
    }

    async fn trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        let cursor = self
            .trips()
            .find(doc! { "participant_ids": user_id })
            .sort(doc! { "start_date": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut details = bson::to_document(trip)?;
        for field in ["_id", "owner_id", "participant_ids", "invited_emails", "created_at"] {
            details.remove(field);
        }
        let mut update = doc! { "$set": details };
        let cleared: Document = [
            ("latitude", trip.latitude.is_none()),
            ("longitude", trip.longitude.is_none()),
            ("place_id", trip.place_id.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(field, _)| (field.to_string(), Bson::String(String::new())))
        .collect();
        if !cleared.is_empty() {
            update.insert("$unset", cleared);
        }

        let result = self
            .trips()
            .update_one(doc! { "_id": &trip.id }, update)
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::NotFound("Trip not found.".to_string()));
        }
        Ok(())
    }

    async fn add_invitations(
        &self,
        trip_id: &str,
        emails: &[String],
    ) -> Result<Option<Trip>, AppError> {
        self.update_trip(
            doc! { "_id": trip_id },
            doc! {
                "$addToSet": { "invited_emails": { "$each": emails.to_vec() } },
                "$set": { "updated_at": now_bson()? },
            },
        )
        .await
    }

    async fn add_participant(
        &self,
        trip_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<Option<Trip>, AppError> {
        self.update_trip(
            doc! { "_id": trip_id, "invited_emails": email },
            doc! {
                "$addToSet": { "participant_ids": user_id },
                "$pull": { "invited_emails": email },
                "$set": { "updated_at": now_bson()? },
            },
        )
        .await
    }

    async fn remove_participant(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> Result<Option<Trip>, AppError> {
        self.update_trip(
            doc! { "_id": trip_id },
            doc! {
                "$pull": { "participant_ids": user_id },
                "$set": { "updated_at": now_bson()? },
            },
        )
        .await
    }

    async fn delete_trip(&self, trip_id: &str) -> Result<(), AppError> {
        let activities = self
            .activities()
            .delete_many(doc! { "trip_id": trip_id })
            .await?;
        self.itineraries()
            .delete_one(doc! { "_id": trip_id })
            .await?;
        self.trips().delete_one(doc! { "_id": trip_id }).await?;
        log::info!(
            "Deleted trip {} with {} activities",
            trip_id,
            activities.deleted_count
        );
        Ok(())
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.activities().insert_one(activity).await?;
        Ok(())
    }

    async fn insert_activities(&self, activities: &[Activity]) -> Result<(), AppError> {
        if activities.is_empty() {
            return Ok(());
        }
        self.activities().insert_many(activities).await?;
        Ok(())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        Ok(self
            .activities()
            .find_one(doc! { "_id": activity_id })
            .await?)
    }

    async fn trip_activities(&self, trip_id: &str) -> Result<Vec<Activity>, AppError> {
        let cursor = self
            .activities()
            .find(doc! { "trip_id": trip_id })
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn shared_activities(&self, location_key: &str) -> Result<Vec<Activity>, AppError> {
        let cursor = self
            .activities()
            .find(doc! { "location_key": location_key, "trip_id": { "$exists": false } })
            .sort(doc! { "created_at": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn adopt_shared_activity(
        &self,
        trip_id: &str,
        shared: &Activity,
    ) -> Result<Activity, AppError> {
        let mut fields = bson::to_document(&shared.adopt_into(trip_id))?;
        fields.remove("trip_id");
        fields.remove("discovery_id");

        let adopted = self
            .activities()
            .find_one_and_update(
                doc! { "trip_id": trip_id, "discovery_id": &shared.id },
                doc! { "$setOnInsert": fields },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        adopted.ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))
    }

    async fn record_vote(
        &self,
        activity_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<Option<VoteReceipt>, AppError> {
        check_vote_key(user_id)?;
        let now = Utc::now();
        let stage = doc! {
            "$set": {
                "votes": {
                    "$mergeObjects": [ { "$ifNull": ["$votes", {}] }, ballot(user_id, liked) ]
                },
                "updated_at": time_bson(&now)?,
            }
        };
        // Replaying the vote on the pre-image yields both the outcome and the
        // record the server now holds.
        let before = self
            .update_votes(activity_id, stage, ReturnDocument::Before)
            .await?;
        Ok(before.map(|mut activity| {
            let outcome = activity.record_vote(user_id, liked);
            (activity.likes, activity.dislikes) = activity.tally();
            activity.updated_at = now;
            VoteReceipt { outcome, activity }
        }))
    }

    async fn retract_vote(
        &self,
        activity_id: &str,
        user_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        check_vote_key(user_id)?;
        let stage = doc! {
            "$set": {
                "votes": {
                    "$unsetField": {
                        "field": { "$literal": user_id },
                        "input": { "$ifNull": ["$votes", {}] },
                    }
                },
                "updated_at": now_bson()?,
            }
        };
        self.update_votes(activity_id, stage, ReturnDocument::After)
            .await
    }

    async fn update_activity_details(
        &self,
        activity_id: &str,
        description: Option<String>,
        image_url: Option<String>,
    ) -> Result<Option<Activity>, AppError> {
        let mut set = doc! { "updated_at": now_bson()? };
        if let Some(description) = description {
            set.insert("description", description);
        }
        if let Some(image_url) = image_url {
            set.insert("image_url", image_url);
        }

        Ok(self
            .activities()
            .find_one_and_update(doc! { "_id": activity_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn clear_shared_activities(&self, location_key: Option<&str>) -> Result<u64, AppError> {
        let mut filter = doc! { "trip_id": { "$exists": false } };
        if let Some(key) = location_key {
            filter.insert("location_key", key);
        }
        let result = self.activities().delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    async fn get_itinerary(&self, trip_id: &str) -> Result<Option<Itinerary>, AppError> {
        Ok(self
            .itineraries()
            .find_one(doc! { "_id": trip_id })
            .await?)
    }

    async fn save_itinerary(&self, itinerary: &Itinerary) -> Result<(), AppError> {
        self.itineraries()
            .replace_one(doc! { "_id": &itinerary.trip_id }, itinerary)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users().find_one(doc! { "_id": user_id }).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }

    async fn insert_user(&self, user: &UserProfile) -> Result<(), AppError> {
        self.users().insert_one(user).await?;
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), AppError> {
        let next = UserProfile {
            version: user.version + 1,
            ..user.clone()
        };
        let result = self
            .users()
            .replace_one(
                doc! { "_id": &user.id, "version": version_filter(user.version) },
                &next,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(stale_profile(&user.id));
        }
        Ok(())
    }
}
