use crate::db::store::TripStore;
use crate::error::AppError;
use crate::middleware::auth_context::AuthenticatedUser;
use crate::models::user::{ProfileUpdate, PublicProfile, UserProfile};

/// The caller's profile, created from the token claims on first use.
pub async fn load_or_create<S: TripStore>(
    store: &S,
    user: &AuthenticatedUser,
) -> Result<UserProfile, AppError> {
    if let Some(profile) = store.get_user(&user.user_id).await? {
        return Ok(profile);
    }

    let profile = UserProfile::new(&user.user_id, &user.display_name(), &user.email);
    if let Err(err) = store.insert_user(&profile).await {
        // A concurrent first visit may have created it already.
        return store.get_user(&user.user_id).await?.ok_or(err);
    }
    log::info!("Created profile for user {}", user.user_id);
    Ok(profile)
}

pub async fn load_user<S: TripStore>(store: &S, user_id: &str) -> Result<UserProfile, AppError> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

pub async fn update_profile<S: TripStore>(
    store: &S,
    user: &AuthenticatedUser,
    update: ProfileUpdate,
) -> Result<UserProfile, AppError> {
    let mut profile = load_or_create(store, user).await?;
    update.apply(&mut profile)?;
    store.save_user(&profile).await?;
    profile.version += 1;
    Ok(profile)
}

pub async fn public_profile<S: TripStore>(
    store: &S,
    user_id: &str,
) -> Result<PublicProfile, AppError> {
    load_user(store, user_id).await.map(PublicProfile::from)
}
