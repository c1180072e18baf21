use serde::Serialize;

use crate::models::trip::Trip;

#[derive(Debug, Serialize, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Invitation mailer. Dispatch is written to the log instead of a provider.
#[derive(Clone)]
pub struct EmailService {
    from_address: String,
    app_base_url: String,
}

impl EmailService {
    pub fn new(from_address: impl Into<String>, app_base_url: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            app_base_url: app_base_url.into(),
        }
    }

    pub fn trip_link(&self, trip: &Trip) -> String {
        format!("{}/trips/{}", self.app_base_url, trip.id)
    }

    /// Copy used when the AI cannot write the invitation.
    pub fn fallback_invitation(&self, trip: &Trip, inviter_name: &str) -> String {
        format!(
            "{} invited you to plan \"{}\" in {} ({} to {}).\n\nJoin the trip and vote on activities: {}",
            inviter_name,
            trip.name,
            trip.destination,
            trip.start_date,
            trip.end_date,
            self.trip_link(trip)
        )
    }

    pub fn invitation(&self, to: &str, trip: &Trip, body: String, reminder: bool) -> OutgoingEmail {
        let subject = if reminder {
            format!("Reminder: you're invited to {}", trip.name)
        } else {
            format!("You're invited to {}", trip.name)
        };
        OutgoingEmail {
            to: to.to_string(),
            from: self.from_address.clone(),
            subject,
            body,
        }
    }

    pub fn send(&self, email: &OutgoingEmail) {
        log::info!(
            "[email] from={} to={} subject=\"{}\" ({} chars)",
            email.from,
            email.to,
            email.subject,
            email.body.len()
        );
        log::debug!("[email] body:\n{}", email.body);
    }
}
