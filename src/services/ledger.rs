use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::models::activity::{
    location_key, Activity, NewActivity, VoteOutcome, VoteReceipt,
};
use crate::models::trip::Trip;
use crate::services::gemini::{generate_typed, AiError, Generative};
use crate::state::AppState;

const DISCOVERY_BATCH: usize = 8;

pub enum ActivityScope<'a> {
    Trip(&'a Trip),
    Location(&'a str),
}

/// Trip-local records first, then shared records the trip has not adopted.
pub fn merge_scope(local: Vec<Activity>, shared: Vec<Activity>) -> Vec<Activity> {
    let adopted: HashSet<String> = local
        .iter()
        .filter_map(|activity| activity.discovery_id.clone())
        .collect();
    let local_ids: HashSet<String> = local.iter().map(|a| a.id.clone()).collect();

    let mut merged = local;
    merged.extend(
        shared
            .into_iter()
            .filter(|a| !adopted.contains(&a.id) && !local_ids.contains(&a.id)),
    );
    merged
}

pub async fn list_activities<S: TripStore>(
    store: &S,
    scope: ActivityScope<'_>,
) -> Result<Vec<Activity>, AppError> {
    match scope {
        ActivityScope::Trip(trip) => {
            let local = store.trip_activities(&trip.id).await?;
            let shared = store.shared_activities(&trip.location_key()).await?;
            Ok(merge_scope(local, shared))
        }
        ActivityScope::Location(location) => {
            store.shared_activities(&location_key(location)).await
        }
    }
}

pub async fn create_activity<S: TripStore>(
    store: &S,
    trip: &Trip,
    user_id: &str,
    input: NewActivity,
) -> Result<Activity, AppError> {
    input.validate()?;
    let activity = input.into_activity(Some(&trip.id), &trip.location_key(), Some(user_id));
    store.insert_activity(&activity).await?;
    log::info!("User {} added activity {} to trip {}", user_id, activity.id, trip.id);
    Ok(activity)
}

/// Finds an activity visible in the trip, adopting a shared record so that
/// changes made in the trip never leak into other trips.
pub async fn resolve_for_update<S: TripStore>(
    store: &S,
    trip: &Trip,
    activity_id: &str,
) -> Result<Activity, AppError> {
    let activity = store
        .get_activity(activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))?;

    match activity.trip_id.as_deref() {
        Some(owner) if owner == trip.id => Ok(activity),
        None if activity.location_key == trip.location_key() => {
            store.adopt_shared_activity(&trip.id, &activity).await
        }
        _ => Err(AppError::NotFound(
            "Activity not found in this trip.".to_string(),
        )),
    }
}

pub async fn cast_vote<S: TripStore>(
    store: &S,
    trip: &Trip,
    activity_id: &str,
    user_id: &str,
    liked: bool,
) -> Result<VoteReceipt, AppError> {
    let current = resolve_for_update(store, trip, activity_id).await?;
    if current.votes.get(user_id) == Some(&liked) {
        return Ok(VoteReceipt {
            outcome: VoteOutcome::Unchanged,
            activity: current,
        });
    }

    let receipt = store
        .record_vote(&current.id, user_id, liked)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))?;
    log::info!(
        "Vote {:?} on activity {} by {}: {} likes / {} dislikes",
        receipt.outcome,
        receipt.activity.id,
        user_id,
        receipt.activity.likes,
        receipt.activity.dislikes
    );
    Ok(receipt)
}

pub async fn retract_vote<S: TripStore>(
    store: &S,
    trip: &Trip,
    activity_id: &str,
    user_id: &str,
) -> Result<Activity, AppError> {
    let current = resolve_for_update(store, trip, activity_id).await?;
    if !current.votes.contains_key(user_id) {
        return Ok(current);
    }
    store
        .retract_vote(&current.id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))
}

#[derive(Debug, Deserialize)]
struct ExtractedActivity {
    name: String,
    location: String,
    duration_minutes: u32,
    description: Option<String>,
    category: Option<String>,
}

impl ExtractedActivity {
    fn into_new(self, source_url: Option<String>) -> Result<NewActivity, AiError> {
        let input = NewActivity {
            name: self.name,
            location: self.location,
            duration_minutes: self.duration_minutes,
            description: self.description,
            category: self.category,
            source_url,
        };
        input
            .validate()
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        Ok(input)
    }
}

fn activity_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": { "type": "STRING" },
            "location": { "type": "STRING" },
            "duration_minutes": { "type": "INTEGER" },
            "description": { "type": "STRING" },
            "category": { "type": "STRING" }
        },
        "required": ["name", "location", "duration_minutes"]
    })
}

pub fn parse_source_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| AppError::Validation(format!("'{}' is not a valid URL.", raw)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::Validation(format!(
            "Only http and https links can be imported, not '{}'.",
            other
        ))),
    }
}

pub async fn extract_activity<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip: &Trip,
    user_id: &str,
    raw_url: &str,
) -> Result<Activity, AppError> {
    let url = parse_source_url(raw_url)?;
    let prompt = format!(
        "Read the page at {url} and extract the single travel activity it describes. \
         The trip is to {destination}. Return its name, the place where it happens, \
         a realistic duration in minutes, a two-sentence description and a one-word category.",
        url = url,
        destination = trip.destination
    );

    let extracted: ExtractedActivity = generate_typed(&state.ai, &prompt, &activity_schema()).await?;
    let input = extracted.into_new(Some(url.to_string()))?;
    create_activity(&state.store, trip, user_id, input).await
}

pub async fn describe_activity<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip: &Trip,
    activity_id: &str,
) -> Result<Activity, AppError> {
    let activity = resolve_for_update(&state.store, trip, activity_id).await?;
    let prompt = format!(
        "Write an inviting description of at most three sentences for the activity \"{}\" at {} \
         during a trip to {}. It takes about {} minutes. Plain text only.",
        activity.name, activity.location, trip.destination, activity.duration_minutes
    );
    let description = state.ai.generate_text(&prompt).await?;

    state
        .store
        .update_activity_details(&activity.id, Some(description), None)
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))
}

pub async fn illustrate_activity<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip: &Trip,
    activity_id: &str,
) -> Result<Activity, AppError> {
    let images = state
        .images
        .as_ref()
        .ok_or_else(|| AppError::Config(crate::config::STORAGE_SETUP.to_string()))?;
    let activity = resolve_for_update(&state.store, trip, activity_id).await?;

    let prompt = format!(
        "A bright travel photograph of {} in {}, no text or people's faces.",
        activity.name, activity.location
    );
    let image = state.ai.generate_image(&prompt).await?;
    let url = images
        .upload(image.bytes, &image.mime_type, &format!("activities/{}", activity.id))
        .await?;

    state
        .store
        .update_activity_details(&activity.id, None, Some(url))
        .await?
        .ok_or_else(|| AppError::NotFound("Activity not found.".to_string()))
}

/// Seeds shared local-discovery records for a location the first time it is asked for.
pub async fn discover_activities<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    location: &str,
) -> Result<Vec<Activity>, AppError> {
    if location.trim().is_empty() {
        return Err(AppError::Validation("Location is required.".to_string()));
    }
    let key = location_key(location);
    let existing = state.store.shared_activities(&key).await?;
    if !existing.is_empty() {
        return Ok(existing);
    }

    let prompt = format!(
        "Suggest {} varied activities a group of friends could do in {}. \
         For each give the name, the place, a realistic duration in minutes, \
         a one-sentence description and a one-word category.",
        DISCOVERY_BATCH,
        location.trim()
    );
    let schema = json!({ "type": "ARRAY", "items": activity_schema() });
    let suggestions: Vec<ExtractedActivity> = generate_typed(&state.ai, &prompt, &schema).await?;

    let activities: Vec<Activity> = suggestions
        .into_iter()
        .filter_map(|suggestion| match suggestion.into_new(None) {
            Ok(input) => Some(input.into_activity(None, &key, None)),
            Err(err) => {
                log::warn!("Skipping discovery suggestion for {}: {}", key, err);
                None
            }
        })
        .collect();
    if activities.is_empty() {
        return Err(AiError::InvalidResponse("no usable activities suggested".to_string()).into());
    }

    state.store.insert_activities(&activities).await?;
    log::info!("Seeded {} shared activities for {}", activities.len(), key);
    Ok(activities)
}

pub async fn clear_shared<S: TripStore>(
    store: &S,
    location: Option<&str>,
) -> Result<u64, AppError> {
    let key = location.map(location_key);
    let removed = store.clear_shared_activities(key.as_deref()).await?;
    log::warn!(
        "Cleared {} shared activities ({})",
        removed,
        key.as_deref().unwrap_or("all locations")
    );
    Ok(removed)
}
