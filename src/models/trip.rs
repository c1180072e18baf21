use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::activity::location_key;
use crate::models::user::{is_valid_email, normalize_email};

/// Longest trip, in days, that can be planned.
pub const MAX_TRIP_DAYS: i64 = 90;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItineraryRule {
    #[default]
    Majority,
    All,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Trip {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub owner_id: String,
    pub participant_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default)]
    pub itinerary_rule: ItineraryRule,
    #[serde(default)]
    pub invited_emails: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.participant_ids.iter().any(|id| id == user_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participant_ids.len()
    }

    pub fn location_key(&self) -> String {
        location_key(&self.destination)
    }

    /// Every calendar day from start to end, inclusive.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|day| *day <= self.end_date)
            .collect()
    }

    pub fn is_invited(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.invited_emails.iter().any(|invited| *invited == email)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewTrip {
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_id: Option<String>,
    pub itinerary_rule: Option<ItineraryRule>,
    #[serde(default)]
    pub invited_emails: Vec<String>,
}

impl NewTrip {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Trip name is required.".to_string()));
        }
        if self.destination.trim().is_empty() {
            return Err(AppError::Validation("Destination is required.".to_string()));
        }
        validate_dates(self.start_date, self.end_date)?;
        validate_emails(&self.invited_emails)
    }

    pub fn into_trip(self, owner_id: &str, owner_email: &str) -> Trip {
        let now = Utc::now();
        let owner_email = normalize_email(owner_email);
        let mut invited_emails: Vec<String> = Vec::new();
        for email in self.invited_emails.iter().map(|e| normalize_email(e)) {
            if email != owner_email && !invited_emails.contains(&email) {
                invited_emails.push(email);
            }
        }

        Trip {
            id: ObjectId::new().to_hex(),
            name: self.name.trim().to_string(),
            destination: self.destination.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            owner_id: owner_id.to_string(),
            participant_ids: vec![owner_id.to_string()],
            latitude: self.latitude,
            longitude: self.longitude,
            place_id: self.place_id,
            itinerary_rule: self.itinerary_rule.unwrap_or_default(),
            invited_emails,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TripUpdate {
    pub name: Option<String>,
    pub destination: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_id: Option<String>,
    pub itinerary_rule: Option<ItineraryRule>,
}

impl TripUpdate {
    pub fn apply(self, trip: &mut Trip) -> Result<(), AppError> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Trip name is required.".to_string()));
            }
            trip.name = name.trim().to_string();
        }
        if let Some(destination) = self.destination {
            if destination.trim().is_empty() {
                return Err(AppError::Validation("Destination is required.".to_string()));
            }
            trip.destination = destination.trim().to_string();
        }
        let start = self.start_date.unwrap_or(trip.start_date);
        let end = self.end_date.unwrap_or(trip.end_date);
        validate_dates(start, end)?;
        trip.start_date = start;
        trip.end_date = end;
        if self.latitude.is_some() {
            trip.latitude = self.latitude;
        }
        if self.longitude.is_some() {
            trip.longitude = self.longitude;
        }
        if self.place_id.is_some() {
            trip.place_id = self.place_id;
        }
        if let Some(rule) = self.itinerary_rule {
            trip.itinerary_rule = rule;
        }
        trip.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_dates(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if end < start {
        return Err(AppError::Validation(
            "The trip must end on or after its start date.".to_string(),
        ));
    }
    if (end - start).num_days() >= MAX_TRIP_DAYS {
        return Err(AppError::Validation(format!(
            "A trip can span at most {} days.",
            MAX_TRIP_DAYS
        )));
    }
    Ok(())
}

pub fn validate_emails(emails: &[String]) -> Result<(), AppError> {
    match emails.iter().find(|email| !is_valid_email(email)) {
        Some(bad) => Err(AppError::Validation(format!(
            "'{}' is not a valid email address.",
            bad
        ))),
        None => Ok(()),
    }
}
