use serde::{Deserialize, Serialize};

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::trip::{validate_emails, NewTrip, Trip, TripUpdate};
use crate::models::user::normalize_email;
use crate::services::gemini::Generative;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InviteInput {
    pub emails: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendInput {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct InvitationReport {
    pub invited: Vec<String>,
    pub already_invited: Vec<String>,
}

pub async fn load_trip<S: TripStore>(store: &S, trip_id: &str) -> Result<Trip, AppError> {
    store
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found.".to_string()))
}

pub async fn load_member_trip<S: TripStore>(
    store: &S,
    trip_id: &str,
    user_id: &str,
) -> Result<Trip, AppError> {
    let trip = load_trip(store, trip_id).await?;
    if !trip.is_member(user_id) {
        return Err(AppError::Forbidden(
            "You are not a participant of this trip.".to_string(),
        ));
    }
    Ok(trip)
}

fn ensure_owner(trip: &Trip, user_id: &str) -> Result<(), AppError> {
    if trip.owner_id != user_id {
        return Err(AppError::Forbidden(
            "Only the trip owner can do that.".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_trip<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    user: &AuthenticatedUser,
    input: NewTrip,
) -> Result<Trip, AppError> {
    input.validate()?;
    let trip = input.into_trip(&user.user_id, &user.email);
    state.store.insert_trip(&trip).await?;
    log::info!("User {} created trip {}", user.user_id, trip.id);

    let invitees = trip.invited_emails.clone();
    for email in &invitees {
        send_invitation(state, &trip, user, email, false).await;
    }
    Ok(trip)
}

pub async fn update_trip<S: TripStore>(
    store: &S,
    trip_id: &str,
    user_id: &str,
    update: TripUpdate,
) -> Result<Trip, AppError> {
    let mut trip = load_member_trip(store, trip_id, user_id).await?;
    update.apply(&mut trip)?;
    store.save_trip(&trip).await?;
    Ok(trip)
}

pub async fn delete_trip<S: TripStore>(
    store: &S,
    trip_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    let trip = load_trip(store, trip_id).await?;
    ensure_owner(&trip, user_id)?;
    store.delete_trip(&trip.id).await
}

pub async fn invite_participants<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip_id: &str,
    user: &AuthenticatedUser,
    input: InviteInput,
) -> Result<InvitationReport, AppError> {
    if input.emails.is_empty() {
        return Err(AppError::Validation(
            "Add at least one email address to invite.".to_string(),
        ));
    }
    validate_emails(&input.emails)?;
    let trip = load_member_trip(&state.store, trip_id, &user.user_id).await?;

    let mut report = InvitationReport {
        invited: Vec::new(),
        already_invited: Vec::new(),
    };
    for email in input.emails.iter().map(|e| normalize_email(e)) {
        if trip.invited_emails.contains(&email) || report.invited.contains(&email) {
            report.already_invited.push(email);
        } else {
            report.invited.push(email);
        }
    }
    if report.invited.is_empty() {
        return Ok(report);
    }

    let trip = state
        .store
        .add_invitations(&trip.id, &report.invited)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found.".to_string()))?;

    for email in &report.invited {
        send_invitation(state, &trip, user, email, false).await;
    }
    Ok(report)
}

pub async fn resend_invitation<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip_id: &str,
    user: &AuthenticatedUser,
    input: ResendInput,
) -> Result<(), AppError> {
    let trip = load_member_trip(&state.store, trip_id, &user.user_id).await?;
    let email = normalize_email(&input.email);
    if !trip.is_invited(&email) {
        return Err(AppError::NotFound(format!(
            "{} has not been invited to this trip.",
            email
        )));
    }
    send_invitation(state, &trip, user, &email, true).await;
    Ok(())
}

/// AI-written copy with a template fallback; dispatch never fails the request.
async fn send_invitation<S: TripStore, G: Generative>(
    state: &AppState<S, G>,
    trip: &Trip,
    inviter: &AuthenticatedUser,
    email: &str,
    reminder: bool,
) {
    let inviter_name = inviter.display_name();
    let prompt = format!(
        "Write a short, friendly invitation email body (no subject line) from {} inviting a friend \
         to help plan a trip called \"{}\" to {} from {} to {}.{} End with this link on its own line: {}",
        inviter_name,
        trip.name,
        trip.destination,
        trip.start_date,
        trip.end_date,
        if reminder {
            " This is a gentle reminder of an earlier invitation."
        } else {
            ""
        },
        state.mailer.trip_link(trip)
    );

    let body = match state.ai.generate_text(&prompt).await {
        Ok(body) if !body.is_empty() => body,
        Ok(_) => state.mailer.fallback_invitation(trip, &inviter_name),
        Err(err) => {
            log::warn!("Using template invitation for trip {}: {}", trip.id, err);
            state.mailer.fallback_invitation(trip, &inviter_name)
        }
    };

    let message = state.mailer.invitation(email, trip, body, reminder);
    state.mailer.send(&message);
}

pub async fn join_trip<S: TripStore>(
    store: &S,
    trip_id: &str,
    user: &AuthenticatedUser,
) -> Result<Trip, AppError> {
    let trip = load_trip(store, trip_id).await?;
    if trip.is_member(&user.user_id) {
        return Ok(trip);
    }
    let email = normalize_email(&user.email);
    if !trip.is_invited(&email) {
        return Err(AppError::Forbidden(
            "You have not been invited to this trip.".to_string(),
        ));
    }

    match store.add_participant(&trip.id, &user.user_id, &email).await? {
        Some(joined) => {
            log::info!("User {} joined trip {}", user.user_id, joined.id);
            Ok(joined)
        }
        // Another request used the invitation first.
        None => {
            let trip = load_trip(store, trip_id).await?;
            if trip.is_member(&user.user_id) {
                Ok(trip)
            } else {
                Err(AppError::Forbidden(
                    "You have not been invited to this trip.".to_string(),
                ))
            }
        }
    }
}

pub async fn remove_participant<S: TripStore>(
    store: &S,
    trip_id: &str,
    caller_id: &str,
    participant_id: &str,
) -> Result<Trip, AppError> {
    let trip = load_member_trip(store, trip_id, caller_id).await?;
    if participant_id == trip.owner_id {
        return Err(AppError::Validation(
            "The owner cannot leave the trip; delete it instead.".to_string(),
        ));
    }
    if caller_id != participant_id && caller_id != trip.owner_id {
        return Err(AppError::Forbidden(
            "Only the trip owner can remove other participants.".to_string(),
        ));
    }
    if !trip.participant_ids.iter().any(|id| id == participant_id) {
        return Err(AppError::NotFound(
            "That user is not a participant of this trip.".to_string(),
        ));
    }

    let trip = store
        .remove_participant(&trip.id, participant_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Trip not found.".to_string()))?;
    log::info!("User {} left trip {}", participant_id, trip.id);
    Ok(trip)
}
