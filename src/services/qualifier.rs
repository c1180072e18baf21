use crate::error::AppError;
use crate::models::{activity::Activity, trip::ItineraryRule};

/// Smallest number of voters a majority decision needs: half the
/// participants, rounded up.
pub fn quorum(participant_count: usize) -> u32 {
    participant_count.div_ceil(2) as u32
}

pub fn qualifies(activity: &Activity, rule: ItineraryRule, participant_count: usize) -> bool {
    match rule {
        ItineraryRule::All => activity.likes as usize == participant_count,
        ItineraryRule::Majority => {
            activity.likes > activity.dislikes
                && activity.likes + activity.dislikes >= quorum(participant_count)
        }
    }
}

/// Keeps the activities the group agreed on, in their original order.
pub fn qualify(
    activities: Vec<Activity>,
    rule: ItineraryRule,
    participant_count: usize,
) -> Result<Vec<Activity>, AppError> {
    if participant_count == 0 {
        return Err(AppError::Validation(
            "A trip needs at least one participant before activities can qualify.".to_string(),
        ));
    }

    let considered = activities.len();
    let qualified: Vec<Activity> = activities
        .into_iter()
        .filter(|activity| qualifies(activity, rule, participant_count))
        .collect();

    if qualified.is_empty() {
        let reason = match rule {
            ItineraryRule::All => format!(
                "every one of the {} participants must like an activity",
                participant_count
            ),
            ItineraryRule::Majority => format!(
                "an activity needs at least {} votes with more likes than dislikes",
                quorum(participant_count)
            ),
        };
        return Err(AppError::NoQualifyingActivities(format!(
            "None of the {} activities qualify yet: {}. Keep voting and try again.",
            considered, reason
        )));
    }

    Ok(qualified)
}
