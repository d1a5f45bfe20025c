//! User lookup and the login token kept in the settings file.
//!
//! Logging in only records which user id is active. There is no credential
//! check of any kind.

use crate::error::{Result, TrackerError};
use crate::models::User;
use crate::settings::Settings;
use crate::store::{Collection, Store};

pub fn get_user(store: &Store, user_id: &str) -> Result<User> {
    store
        .get_doc(Collection::Users, user_id)
        .inspect_err(|e| tracing::error!(error = %e, user_id, "get_user failed"))?
        .ok_or_else(|| TrackerError::UnknownUser(user_id.to_string()))
}

pub fn create_user(store: &Store, user_id: &str, name: &str) -> Result<User> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(TrackerError::Required("user id"));
    }
    let user = User {
        user_id: user_id.to_string(),
        name: name.trim().to_string(),
    };
    store.set_doc(Collection::Users, &user.user_id, &user)?;
    Ok(user)
}

/// Looks the user up and records it as logged in. The caller persists `settings`.
pub fn login(store: &Store, settings: &mut Settings, user_id: &str) -> Result<User> {
    let user = get_user(store, user_id)?;
    settings.login_token = Some(user.user_id.clone());
    Ok(user)
}

pub fn logout(settings: &mut Settings) {
    settings.login_token = None;
}

/// The logged-in user. Fails when nobody is logged in; a token whose user
/// can no longer be loaded is logged and yields `None`.
pub fn current_user(store: &Store, settings: &Settings) -> Result<Option<User>> {
    let token = settings.login_token.as_deref().ok_or(TrackerError::NotLoggedIn)?;
    match get_user(store, token) {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            tracing::warn!(user_id = token, error = %e, "could not load logged-in user");
            Ok(None)
        }
    }
}
