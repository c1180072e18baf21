//! Partner and friend requests between two user profiles.
//!
//! Each side of a pending request keeps its own record (outgoing for the
//! sender, incoming for the recipient). Answering or withdrawing a request
//! clears both records; accepting also links the two profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::store::TripStore;
use crate::error::AppError;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::{
    is_valid_email, normalize_email, ConnectionRequest, PublicProfile, RequestDirection,
    RequestStatus, UserProfile,
};
use crate::services::user_service::{load_or_create, load_user};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Partner,
    Friend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    None,
    PendingOutgoing,
    PendingIncoming,
    Connected,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("You cannot send a request to yourself.")]
    SelfRequest,
    #[error("You already have a partner.")]
    SenderPartnered,
    #[error("{0} already has a partner.")]
    RecipientPartnered(String),
    #[error("You already have a pending partner request.")]
    SenderPartnerPending,
    #[error("{0} already has a pending partner request.")]
    RecipientPartnerPending(String),
    #[error("You are already friends with {0}.")]
    AlreadyFriends(String),
    #[error("A request between you and {0} is already pending.")]
    AlreadyPending(String),
    #[error("There is no pending request between you and {0}.")]
    NoPendingRequest(String),
    #[error("Only the person who sent the request can withdraw it.")]
    NotSender,
    #[error("Only the person who received the request can answer it.")]
    NotRecipient,
    #[error("You are not connected with {0}.")]
    NotConnected(String),
}

impl From<HandshakeError> for AppError {
    fn from(err: HandshakeError) -> Self {
        let message = err.to_string();
        match err {
            HandshakeError::SelfRequest => AppError::Validation(message),
            HandshakeError::NoPendingRequest(_) | HandshakeError::NotConnected(_) => {
                AppError::NotFound(message)
            }
            HandshakeError::NotSender | HandshakeError::NotRecipient => {
                AppError::Forbidden(message)
            }
            _ => AppError::Conflict(message),
        }
    }
}

fn pending_with<'a>(
    profile: &'a UserProfile,
    kind: ConnectionKind,
    counterpart_id: &str,
) -> Option<&'a ConnectionRequest> {
    match kind {
        ConnectionKind::Partner => profile
            .partner_request
            .as_ref()
            .filter(|request| request.counterpart_id == counterpart_id),
        ConnectionKind::Friend => profile
            .friend_requests
            .iter()
            .find(|request| request.counterpart_id == counterpart_id),
    }
}

fn clear_pending(
    profile: &mut UserProfile,
    kind: ConnectionKind,
    counterpart_id: &str,
) -> Option<ConnectionRequest> {
    let cleared = match kind {
        ConnectionKind::Partner => {
            if pending_with(profile, kind, counterpart_id).is_some() {
                profile.partner_request.take()
            } else {
                None
            }
        }
        ConnectionKind::Friend => profile
            .friend_requests
            .iter()
            .position(|request| request.counterpart_id == counterpart_id)
            .map(|index| profile.friend_requests.remove(index)),
    };
    if cleared.is_some() {
        profile.touch();
    }
    cleared
}

fn is_connected(kind: ConnectionKind, a: &UserProfile, b: &UserProfile) -> bool {
    match kind {
        ConnectionKind::Partner => a.partner_id.as_deref() == Some(b.id.as_str()),
        ConnectionKind::Friend => a.friend_ids.iter().any(|id| *id == b.id),
    }
}

fn record_for(direction: RequestDirection, counterpart: &UserProfile, now: DateTime<Utc>) -> ConnectionRequest {
    ConnectionRequest {
        direction,
        counterpart_id: counterpart.id.clone(),
        counterpart_name: counterpart.name.clone(),
        counterpart_email: counterpart.email.clone(),
        status: RequestStatus::Pending,
        created_at: now,
    }
}

/// The relationship as seen from `a`.
pub fn state_between(kind: ConnectionKind, a: &UserProfile, b: &UserProfile) -> ConnectionState {
    if is_connected(kind, a, b) {
        return ConnectionState::Connected;
    }
    match pending_with(a, kind, &b.id).map(|request| request.direction) {
        Some(RequestDirection::Outgoing) => ConnectionState::PendingOutgoing,
        Some(RequestDirection::Incoming) => ConnectionState::PendingIncoming,
        None => ConnectionState::None,
    }
}

pub fn send(
    kind: ConnectionKind,
    sender: &mut UserProfile,
    recipient: &mut UserProfile,
    now: DateTime<Utc>,
) -> Result<ConnectionRequest, HandshakeError> {
    if sender.id == recipient.id {
        return Err(HandshakeError::SelfRequest);
    }
    if pending_with(sender, kind, &recipient.id).is_some()
        || pending_with(recipient, kind, &sender.id).is_some()
    {
        return Err(HandshakeError::AlreadyPending(recipient.name.clone()));
    }

    match kind {
        ConnectionKind::Partner => {
            if sender.partner_id.is_some() {
                return Err(HandshakeError::SenderPartnered);
            }
            if recipient.partner_id.is_some() {
                return Err(HandshakeError::RecipientPartnered(recipient.name.clone()));
            }
            if sender.partner_request.is_some() {
                return Err(HandshakeError::SenderPartnerPending);
            }
            if recipient.partner_request.is_some() {
                return Err(HandshakeError::RecipientPartnerPending(
                    recipient.name.clone(),
                ));
            }
        }
        ConnectionKind::Friend => {
            if is_connected(kind, sender, recipient) {
                return Err(HandshakeError::AlreadyFriends(recipient.name.clone()));
            }
        }
    }

    let outgoing = record_for(RequestDirection::Outgoing, recipient, now);
    let incoming = record_for(RequestDirection::Incoming, sender, now);
    match kind {
        ConnectionKind::Partner => {
            sender.partner_request = Some(outgoing.clone());
            recipient.partner_request = Some(incoming);
        }
        ConnectionKind::Friend => {
            sender.friend_requests.push(outgoing.clone());
            recipient.friend_requests.push(incoming);
        }
    }
    sender.touch();
    recipient.touch();
    Ok(outgoing)
}

pub fn respond(
    kind: ConnectionKind,
    responder: &mut UserProfile,
    sender: &mut UserProfile,
    accept: bool,
) -> Result<ConnectionRequest, HandshakeError> {
    let pending = pending_with(responder, kind, &sender.id)
        .ok_or_else(|| HandshakeError::NoPendingRequest(sender.name.clone()))?;
    if pending.direction != RequestDirection::Incoming {
        return Err(HandshakeError::NotRecipient);
    }
    if accept && kind == ConnectionKind::Partner {
        if responder.partner_id.is_some() {
            return Err(HandshakeError::SenderPartnered);
        }
        if sender.partner_id.is_some() {
            return Err(HandshakeError::RecipientPartnered(sender.name.clone()));
        }
    }

    let mut record = clear_pending(responder, kind, &sender.id)
        .ok_or_else(|| HandshakeError::NoPendingRequest(sender.name.clone()))?;
    clear_pending(sender, kind, &responder.id);

    if accept {
        match kind {
            ConnectionKind::Partner => {
                responder.partner_id = Some(sender.id.clone());
                sender.partner_id = Some(responder.id.clone());
            }
            ConnectionKind::Friend => {
                if !responder.friend_ids.contains(&sender.id) {
                    responder.friend_ids.push(sender.id.clone());
                }
                if !sender.friend_ids.contains(&responder.id) {
                    sender.friend_ids.push(responder.id.clone());
                }
            }
        }
        responder.touch();
        sender.touch();
    }

    record.status = if accept {
        RequestStatus::Accepted
    } else {
        RequestStatus::Declined
    };
    Ok(record)
}

pub fn cancel(
    kind: ConnectionKind,
    caller: &mut UserProfile,
    recipient: &mut UserProfile,
) -> Result<ConnectionRequest, HandshakeError> {
    let pending = pending_with(caller, kind, &recipient.id)
        .ok_or_else(|| HandshakeError::NoPendingRequest(recipient.name.clone()))?;
    if pending.direction != RequestDirection::Outgoing {
        return Err(HandshakeError::NotSender);
    }

    let mut record = clear_pending(caller, kind, &recipient.id)
        .ok_or_else(|| HandshakeError::NoPendingRequest(recipient.name.clone()))?;
    clear_pending(recipient, kind, &caller.id);
    record.status = RequestStatus::Cancelled;
    Ok(record)
}

pub fn disconnect(
    kind: ConnectionKind,
    caller: &mut UserProfile,
    other: &mut UserProfile,
) -> Result<(), HandshakeError> {
    if !is_connected(kind, caller, other) {
        return Err(HandshakeError::NotConnected(other.name.clone()));
    }
    match kind {
        ConnectionKind::Partner => {
            caller.partner_id = None;
            if other.partner_id.as_deref() == Some(caller.id.as_str()) {
                other.partner_id = None;
            }
        }
        ConnectionKind::Friend => {
            caller.friend_ids.retain(|id| *id != other.id);
            other.friend_ids.retain(|id| *id != caller.id);
        }
    }
    caller.touch();
    other.touch();
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SendRequestInput {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RespondInput {
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectionsView {
    pub partner: Option<PublicProfile>,
    pub friends: Vec<PublicProfile>,
    pub partner_request: Option<ConnectionRequest>,
    pub friend_requests: Vec<ConnectionRequest>,
}

async fn load_pair<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
    other_id: &str,
) -> Result<(UserProfile, UserProfile), AppError> {
    if caller.user_id == other_id {
        return Err(HandshakeError::SelfRequest.into());
    }
    let me = load_or_create(store, caller).await?;
    let other = load_user(store, other_id).await?;
    Ok((me, other))
}

/// Saves both sides of a transition. Each save is version checked; when the
/// second one is refused, the first profile is put back as it was loaded.
async fn save_pair<S: TripStore>(
    store: &S,
    a_loaded: &UserProfile,
    a: &UserProfile,
    b: &UserProfile,
) -> Result<(), AppError> {
    store.save_user(a).await?;
    if let Err(err) = store.save_user(b).await {
        let restore = UserProfile {
            version: a.version + 1,
            ..a_loaded.clone()
        };
        if let Err(undo) = store.save_user(&restore).await {
            log::error!(
                "Could not restore profile {} after a failed handshake: {}",
                a.id,
                undo
            );
        }
        return Err(err);
    }
    Ok(())
}

pub async fn send_request<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
    kind: ConnectionKind,
    input: SendRequestInput,
) -> Result<ConnectionRequest, AppError> {
    if !is_valid_email(&input.email) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid email address.",
            input.email
        )));
    }
    let mut me = load_or_create(store, caller).await?;
    let mut recipient = store
        .find_user_by_email(&normalize_email(&input.email))
        .await?
        .ok_or_else(|| AppError::NotFound("No user is registered with that email.".to_string()))?;

    let loaded = recipient.clone();
    let request = send(kind, &mut me, &mut recipient, Utc::now())?;
    save_pair(store, &loaded, &recipient, &me).await?;
    log::info!("{:?} request sent from {} to {}", kind, me.id, recipient.id);
    Ok(request)
}

pub async fn respond_request<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
    kind: ConnectionKind,
    sender_id: &str,
    accept: bool,
) -> Result<ConnectionRequest, AppError> {
    let (mut me, mut sender) = load_pair(store, caller, sender_id).await?;
    let loaded = me.clone();
    let record = respond(kind, &mut me, &mut sender, accept)?;
    save_pair(store, &loaded, &me, &sender).await?;
    log::info!(
        "{:?} request from {} to {} {:?}",
        kind,
        sender.id,
        me.id,
        record.status
    );
    Ok(record)
}

pub async fn cancel_request<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
    kind: ConnectionKind,
    recipient_id: &str,
) -> Result<ConnectionRequest, AppError> {
    let (mut me, mut recipient) = load_pair(store, caller, recipient_id).await?;
    let loaded = me.clone();
    let record = cancel(kind, &mut me, &mut recipient)?;
    save_pair(store, &loaded, &me, &recipient).await?;
    log::info!("{:?} request from {} to {} cancelled", kind, me.id, recipient.id);
    Ok(record)
}

pub async fn remove_connection<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
    kind: ConnectionKind,
    other_id: &str,
) -> Result<(), AppError> {
    let (mut me, mut other) = load_pair(store, caller, other_id).await?;
    let loaded = me.clone();
    disconnect(kind, &mut me, &mut other)?;
    save_pair(store, &loaded, &me, &other).await
}

pub async fn connections<S: TripStore>(
    store: &S,
    caller: &AuthenticatedUser,
) -> Result<ConnectionsView, AppError> {
    let me = load_or_create(store, caller).await?;

    let partner = match &me.partner_id {
        Some(id) => store.get_user(id).await?.map(PublicProfile::from),
        None => None,
    };
    let mut friends = Vec::with_capacity(me.friend_ids.len());
    for id in &me.friend_ids {
        match store.get_user(id).await? {
            Some(friend) => friends.push(PublicProfile::from(friend)),
            None => log::warn!("User {} lists missing friend {}", me.id, id),
        }
    }

    Ok(ConnectionsView {
        partner,
        friends,
        partner_request: me.partner_request,
        friend_requests: me.friend_requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> UserProfile {
        UserProfile::new(id, id, &format!("{}@example.com", id))
    }

    #[test]
    fn accepted_partner_request_links_both_profiles() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Partner, &mut a, &mut b, Utc::now()).unwrap();
        assert_eq!(
            state_between(ConnectionKind::Partner, &a, &b),
            ConnectionState::PendingOutgoing
        );
        assert_eq!(
            state_between(ConnectionKind::Partner, &b, &a),
            ConnectionState::PendingIncoming
        );

        let record = respond(ConnectionKind::Partner, &mut b, &mut a, true).unwrap();
        assert_eq!(record.status, RequestStatus::Accepted);
        assert_eq!(a.partner_id.as_deref(), Some("b"));
        assert_eq!(b.partner_id.as_deref(), Some("a"));
        assert!(a.partner_request.is_none() && b.partner_request.is_none());
    }

    #[test]
    fn cancelled_request_leaves_no_trace() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Friend, &mut a, &mut b, Utc::now()).unwrap();
        let record = cancel(ConnectionKind::Friend, &mut a, &mut b).unwrap();
        assert_eq!(record.status, RequestStatus::Cancelled);
        assert!(a.friend_requests.is_empty() && b.friend_requests.is_empty());
        assert!(a.friend_ids.is_empty() && b.friend_ids.is_empty());
        assert_eq!(
            state_between(ConnectionKind::Friend, &a, &b),
            ConnectionState::None
        );
    }

    #[test]
    fn only_the_sender_may_cancel() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Partner, &mut a, &mut b, Utc::now()).unwrap();
        assert_eq!(
            cancel(ConnectionKind::Partner, &mut b, &mut a),
            Err(HandshakeError::NotSender)
        );
        assert!(b.partner_request.is_some());
    }

    #[test]
    fn only_the_recipient_may_respond() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Friend, &mut a, &mut b, Utc::now()).unwrap();
        assert_eq!(
            respond(ConnectionKind::Friend, &mut a, &mut b, true),
            Err(HandshakeError::NotRecipient)
        );
    }

    #[test]
    fn declining_clears_without_linking() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Partner, &mut a, &mut b, Utc::now()).unwrap();
        let record = respond(ConnectionKind::Partner, &mut b, &mut a, false).unwrap();
        assert_eq!(record.status, RequestStatus::Declined);
        assert!(a.partner_id.is_none() && b.partner_id.is_none());
        assert!(a.partner_request.is_none() && b.partner_request.is_none());
    }

    #[test]
    fn partnered_users_cannot_receive_partner_requests() {
        let (mut a, mut b, mut c) = (profile("a"), profile("b"), profile("c"));
        send(ConnectionKind::Partner, &mut a, &mut b, Utc::now()).unwrap();
        respond(ConnectionKind::Partner, &mut b, &mut a, true).unwrap();
        assert_eq!(
            send(ConnectionKind::Partner, &mut c, &mut a, Utc::now()),
            Err(HandshakeError::RecipientPartnered("a".to_string()))
        );
        assert_eq!(
            send(ConnectionKind::Partner, &mut a, &mut c, Utc::now()),
            Err(HandshakeError::SenderPartnered)
        );
    }

    #[test]
    fn duplicate_requests_are_rejected_in_either_direction() {
        let (mut a, mut b) = (profile("a"), profile("b"));
        send(ConnectionKind::Friend, &mut a, &mut b, Utc::now()).unwrap();
        assert!(matches!(
            send(ConnectionKind::Friend, &mut a, &mut b, Utc::now()),
            Err(HandshakeError::AlreadyPending(_))
        ));
        assert!(matches!(
            send(ConnectionKind::Friend, &mut b, &mut a, Utc::now()),
            Err(HandshakeError::AlreadyPending(_))
        ));
    }

    #[test]
    fn partner_slot_holds_one_request() {
        let (mut a, mut b, mut c) = (profile("a"), profile("b"), profile("c"));
        send(ConnectionKind::Partner, &mut a, &mut b, Utc::now()).unwrap();
        assert_eq!(
            send(ConnectionKind::Partner, &mut c, &mut b, Utc::now()),
            Err(HandshakeError::RecipientPartnerPending("b".to_string()))
        );
        assert_eq!(
            send(ConnectionKind::Partner, &mut a, &mut c, Utc::now()),
            Err(HandshakeError::SenderPartnerPending)
        );
    }

    #[test]
    fn friends_accumulate_and_can_be_removed() {
        let (mut a, mut b, mut c) = (profile("a"), profile("b"), profile("c"));
        send(ConnectionKind::Friend, &mut a, &mut b, Utc::now()).unwrap();
        send(ConnectionKind::Friend, &mut a, &mut c, Utc::now()).unwrap();
        respond(ConnectionKind::Friend, &mut b, &mut a, true).unwrap();
        respond(ConnectionKind::Friend, &mut c, &mut a, true).unwrap();
        assert_eq!(a.friend_ids, vec!["b".to_string(), "c".to_string()]);
        assert!(matches!(
            send(ConnectionKind::Friend, &mut b, &mut a, Utc::now()),
            Err(HandshakeError::AlreadyFriends(_))
        ));

        disconnect(ConnectionKind::Friend, &mut b, &mut a).unwrap();
        assert_eq!(a.friend_ids, vec!["c".to_string()]);
        assert!(b.friend_ids.is_empty());
    }

    #[test]
    fn self_requests_are_rejected() {
        let mut a = profile("a");
        let mut a_again = profile("a");
        assert_eq!(
            send(ConnectionKind::Friend, &mut a, &mut a_again, Utc::now()),
            Err(HandshakeError::SelfRequest)
        );
    }

    #[test]
    fn errors_map_to_statuses() {
        use actix_web::ResponseError;
        assert_eq!(AppError::from(HandshakeError::NotSender).status_code(), 403);
        assert_eq!(
            AppError::from(HandshakeError::NoPendingRequest("b".into())).status_code(),
            404
        );
        assert_eq!(AppError::from(HandshakeError::SenderPartnered).status_code(), 409);
    }
}
