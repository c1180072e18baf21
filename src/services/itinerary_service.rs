use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::models::activity::Activity;
use crate::models::itinerary::{InsertActivity, Itinerary, ItineraryDay, Priority, ScheduledActivity};
use crate::models::trip::Trip;
use crate::services::gemini::{generate_typed, AiError, Generative};
use crate::services::ledger::{list_activities, resolve_for_update, ActivityScope};
use crate::services::qualifier::qualify;
use crate::services::trip_service::load_member_trip;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlannedItinerary {
    pub days: Vec<PlannedDay>,
}

#[derive(Debug, Deserialize)]
pub struct PlannedDay {
    pub date: String,
    #[serde(default)]
    pub activities: Vec<PlannedActivity>,
}

#[derive(Debug, Deserialize)]
pub struct PlannedActivity {
    pub activity_id: String,
    pub start_time: String,
    pub category: String,
    pub notes: Option<String>,
}

fn itinerary_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "days": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "date": { "type": "STRING", "description": "YYYY-MM-DD" },
                        "activities": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "activity_id": { "type": "STRING" },
                                    "start_time": { "type": "STRING", "description": "HH:MM, 24-hour" },
                                    "category": {
                                        "type": "STRING",
                                        "enum": ["Must Do", "Recommended", "Optional"]
                                    },
                                    "notes": { "type": "STRING" }
                                },
                                "required": ["activity_id", "start_time", "category"]
                            }
                        }
                    },
                    "required": ["date", "activities"]
                }
            }
        },
        "required": ["days"]
    })
}

fn itinerary_prompt(trip: &Trip, qualified: &[Activity]) -> String {
    let candidates: Vec<Value> = qualified
        .iter()
        .map(|activity| {
            json!({
                "activity_id": activity.id,
                "name": activity.name,
                "location": activity.location,
                "duration_minutes": activity.duration_minutes,
                "category": activity.category,
                "likes": activity.likes,
                "dislikes": activity.dislikes,
            })
        })
        .collect();

    format!(
        "You are planning a group trip to {destination} from {start} to {end} (inclusive). \
         Schedule the activities below across those dates. Use each activity at most once, \
         only use the given activity_id values, keep activities of one day from overlapping, \
         and start no earlier than 08:00. Label the best-loved activities \"Must Do\", \
         solid choices \"Recommended\" and the rest \"Optional\". Days may be left empty.\n\n\
         Activities:\n{activities}",
        destination = trip.destination,
        start = trip.start_date,
        end = trip.end_date,
        activities = Value::Array(candidates)
    )
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn parse_priority(raw: &str) -> Option<Priority> {
    serde_json::from_value(Value::String(raw.trim().to_string())).ok()
}

/// Turns the model's plan into an itinerary, dropping entries that do not
/// fit the trip: unknown activities, dates outside the range, bad times.
pub fn build_itinerary(
    trip: &Trip,
    qualified: &[Activity],
    plan: PlannedItinerary,
) -> Result<Itinerary, AiError> {
    let by_id: HashMap<&str, &Activity> = qualified.iter().map(|a| (a.id.as_str(), a)).collect();
    let mut days: BTreeMap<NaiveDate, ItineraryDay> = trip
        .dates()
        .into_iter()
        .map(|date| {
            (
                date,
                ItineraryDay {
                    date,
                    activities: Vec::new(),
                },
            )
        })
        .collect();

    let mut scheduled = 0;
    for planned_day in plan.days {
        let Ok(date) = NaiveDate::parse_from_str(planned_day.date.trim(), "%Y-%m-%d") else {
            log::warn!("Ignoring planned day with bad date '{}'", planned_day.date);
            continue;
        };
        let Some(day) = days.get_mut(&date) else {
            log::warn!("Ignoring planned day {} outside trip {}", date, trip.id);
            continue;
        };

        for planned in planned_day.activities {
            let Some(activity) = by_id.get(planned.activity_id.as_str()) else {
                log::warn!("Ignoring unknown activity '{}' in plan", planned.activity_id);
                continue;
            };
            let (Some(start_time), Some(category)) =
                (parse_time(&planned.start_time), parse_priority(&planned.category))
            else {
                log::warn!(
                    "Ignoring activity '{}' with time '{}' and category '{}'",
                    planned.activity_id,
                    planned.start_time,
                    planned.category
                );
                continue;
            };
            if day.activities.iter().any(|a| a.activity_id == activity.id) {
                continue;
            }

            day.insert_sorted(ScheduledActivity {
                activity_id: activity.id.clone(),
                name: activity.name.clone(),
                start_time,
                duration_minutes: activity.duration_minutes,
                category,
                notes: planned.notes.filter(|n| !n.trim().is_empty()),
            });
            scheduled += 1;
        }
    }

    if scheduled == 0 {
        return Err(AiError::InvalidResponse(
            "the plan did not schedule any of the qualifying activities".to_string(),
        ));
    }

    let now = Utc::now();
    Ok(Itinerary {
        trip_id: trip.id.clone(),
        rule: trip.itinerary_rule,
        days: days.into_values().collect(),
        generated_at: now,
        updated_at: now,
    })
}

/// Regenerates the trip's itinerary from the activities the group agreed on,
/// replacing any previous one.
pub async fn generate<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip_id: &str,
    user_id: &str,
) -> Result<Itinerary, AppError> {
    let trip = load_member_trip(&state.store, trip_id, user_id).await?;
    let activities = list_activities(&state.store, ActivityScope::Trip(&trip)).await?;
    let qualified = qualify(activities, trip.itinerary_rule, trip.participant_count())?;
    log::info!(
        "Generating itinerary for trip {} from {} qualifying activities",
        trip.id,
        qualified.len()
    );

    let prompt = itinerary_prompt(&trip, &qualified);
    let plan: PlannedItinerary = generate_typed(&state.ai, &prompt, &itinerary_schema()).await?;
    let itinerary = build_itinerary(&trip, &qualified, plan)?;

    state.store.save_itinerary(&itinerary).await?;
    Ok(itinerary)
}

pub async fn get_itinerary<S: TripStore>(
    store: &S,
    trip_id: &str,
    user_id: &str,
) -> Result<Itinerary, AppError> {
    let trip = load_member_trip(store, trip_id, user_id).await?;
    store
        .get_itinerary(&trip.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No itinerary has been generated yet.".to_string()))
}

pub async fn insert_activity<S: TripStore>(
    store: &S,
    trip_id: &str,
    user_id: &str,
    date: NaiveDate,
    input: InsertActivity,
) -> Result<Itinerary, AppError> {
    let trip = load_member_trip(store, trip_id, user_id).await?;
    let mut itinerary = store
        .get_itinerary(&trip.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Generate an itinerary first.".to_string()))?;
    let activity = resolve_for_update(store, &trip, &input.activity_id).await?;

    let day = itinerary.day_mut(date).ok_or_else(|| {
        AppError::Validation(format!("{} is not one of the trip's days.", date))
    })?;
    if day.activities.iter().any(|a| a.activity_id == activity.id) {
        return Err(AppError::Conflict(format!(
            "{} is already planned for {}.",
            activity.name, date
        )));
    }

    day.insert_sorted(ScheduledActivity {
        activity_id: activity.id.clone(),
        name: activity.name.clone(),
        start_time: input.start_time,
        duration_minutes: activity.duration_minutes,
        category: input.category,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
    });
    itinerary.updated_at = Utc::now();
    store.save_itinerary(&itinerary).await?;
    Ok(itinerary)
}
