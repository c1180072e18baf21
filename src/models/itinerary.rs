use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::trip::ItineraryRule;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    #[serde(rename = "Must Do")]
    MustDo,
    #[serde(rename = "Recommended")]
    Recommended,
    #[serde(rename = "Optional")]
    Optional,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScheduledActivity {
    pub activity_id: String,
    pub name: String,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub category: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ItineraryDay {
    pub date: NaiveDate,
    pub activities: Vec<ScheduledActivity>,
}

impl ItineraryDay {
    pub fn insert_sorted(&mut self, item: ScheduledActivity) {
        let position = self
            .activities
            .iter()
            .position(|existing| existing.start_time > item.start_time)
            .unwrap_or(self.activities.len());
        self.activities.insert(position, item);
    }
}

/// Stored once per trip, keyed by the trip id.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Itinerary {
    #[serde(rename = "_id")]
    pub trip_id: String,
    pub rule: ItineraryRule,
    pub days: Vec<ItineraryDay>,
    pub generated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Itinerary {
    pub fn day_mut(&mut self, date: NaiveDate) -> Option<&mut ItineraryDay> {
        self.days.iter_mut().find(|day| day.date == date)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InsertActivity {
    pub activity_id: String,
    pub start_time: NaiveTime,
    pub category: Priority,
    pub notes: Option<String>,
}
