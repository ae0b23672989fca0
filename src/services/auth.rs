use std::sync::PoisonError;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("access token is not a JWT")]
    Malformed,

    #[error("access token payload is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("access token claims are invalid: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Read the user claims from a JWT payload. The signature is not checked.
pub fn decode_claims(token: &str) -> Result<User, AuthError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => return Err(AuthError::Malformed),
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn landing_route(role: &Role) -> &'static str {
    match role {
        Role::Student => "/my-bookings",
        _ => "/portal",
    }
}

/// Where a signed-in user is sent when a page is not for their role.
pub fn denied_route(role: &Role) -> &'static str {
    match role {
        Role::Student => "/my-bookings",
        _ => "/",
    }
}

pub fn authorize(user: Option<User>, allowed: &[Role]) -> Result<User, AppError> {
    let user = user.ok_or(AppError::Unauthorized)?;
    if allowed.contains(&user.role) {
        Ok(user)
    } else {
        Err(AppError::Forbidden {
            redirect: denied_route(&user.role),
        })
    }
}

pub fn current_user(state: &AppState) -> Option<User> {
    state
        .current_user
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn set_session(state: &AppState, token: Option<String>, user: Option<User>) {
    state.backend.set_token(token);
    *state
        .current_user
        .write()
        .unwrap_or_else(PoisonError::into_inner) = user;
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<User, AppError> {
    let token = state.backend.login(email, password).await.map_err(|e| {
        if e.is_unauthorized() {
            AppError::InvalidCredentials
        } else {
            AppError::Backend(e)
        }
    })?;

    let user = decode_claims(&token).map_err(|e| {
        tracing::warn!(error = %e, "login returned an unreadable token");
        AppError::InvalidCredentials
    })?;

    {
        let db = state.db.lock().unwrap_or_else(PoisonError::into_inner);
        queries::save_auth_token(&db, &token)?;
    }
    set_session(state, Some(token), Some(user.clone()));

    tracing::info!(user_id = %user.user_id, role = ?user.role, "signed in");
    Ok(user)
}

pub fn logout(state: &AppState) -> Result<(), AppError> {
    {
        let db = state.db.lock().unwrap_or_else(PoisonError::into_inner);
        queries::clear_auth_token(&db)?;
    }
    set_session(state, None, None);
    tracing::info!("signed out");
    Ok(())
}

/// Pick up a token saved by an earlier run. An unreadable token is discarded.
pub fn restore(state: &AppState) -> anyhow::Result<Option<User>> {
    let db = state.db.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(token) = queries::load_auth_token(&db)? else {
        return Ok(None);
    };

    match decode_claims(&token) {
        Ok(user) => {
            drop(db);
            tracing::info!(user_id = %user.user_id, "restored saved sign-in");
            set_session(state, Some(token), Some(user.clone()));
            Ok(Some(user))
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding saved token");
            queries::clear_auth_token(&db)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_for(claims: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[test]
    fn test_decode_claims() {
        let token = token_for(
            r#"{"userId":"u1","email":"sam@example.com","role":"Student","name":"Sam","iat":1}"#,
        );
        let user = decode_claims(&token).unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.name, "Sam");
    }

    #[test]
    fn test_unknown_role_still_decodes() {
        let token = token_for(r#"{"userId":"u2","email":"x@y","role":"Auditor"}"#);
        assert_eq!(decode_claims(&token).unwrap().role, Role::Other);
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(decode_claims("abc"), Err(AuthError::Malformed)));
        assert!(matches!(decode_claims("a.!!!.c"), Err(AuthError::Encoding(_))));
        let not_claims = token_for(r#"{"hello":"world"}"#);
        assert!(matches!(decode_claims(&not_claims), Err(AuthError::Claims(_))));
    }

    #[test]
    fn test_role_routing() {
        assert_eq!(landing_route(&Role::Student), "/my-bookings");
        assert_eq!(landing_route(&Role::Admin), "/portal");
        assert_eq!(landing_route(&Role::Instructor), "/portal");
    }

    #[test]
    fn test_authorize() {
        let student = User {
            user_id: "u1".into(),
            email: "s@x".into(),
            role: Role::Student,
            name: String::new(),
        };
        let admin = User {
            role: Role::Admin,
            ..student.clone()
        };

        assert!(matches!(authorize(None, &[Role::Admin]), Err(AppError::Unauthorized)));
        assert!(authorize(Some(admin.clone()), &[Role::Admin]).is_ok());
        assert!(matches!(
            authorize(Some(student), &[Role::Admin]),
            Err(AppError::Forbidden { redirect: "/my-bookings" })
        ));
        assert!(matches!(
            authorize(Some(admin), &[Role::Student]),
            Err(AppError::Forbidden { redirect: "/" })
        ));
    }
}
