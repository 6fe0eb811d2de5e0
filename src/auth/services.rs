use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::Identity,
        dto::{LoginRequest, SignupRequest},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking},
        repo_types::{NewUser, Role, User},
    },
    error::{ApiError, FieldError},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks every signup field and reports all failures together.
fn validate_signup(req: &SignupRequest) -> Result<(NewUserInput, String), ApiError> {
    let mut errors = Vec::new();

    let name = req.name.trim().to_string();
    if name.is_empty() {
        errors.push(FieldError::body("name", "Name is required"));
    }
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        errors.push(FieldError::body("email", "Valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::body(
            "password",
            "Password must be at least 6 characters long",
        ));
    }
    let role = req.role.parse::<Role>().ok();
    if role.is_none() {
        errors.push(FieldError::body("role", "Valid role is required"));
    }

    match role {
        Some(role) if errors.is_empty() => {
            Ok((NewUserInput { name, email, role }, req.password.clone()))
        }
        _ => Err(ApiError::validation(errors)),
    }
}

#[derive(Debug)]
struct NewUserInput {
    name: String,
    email: String,
    role: Role,
}

pub fn issue_token(keys: &JwtKeys, identity: &Identity) -> Result<String, ApiError> {
    Ok(keys.sign(identity)?)
}

/// Verifies a bearer token and returns the identity it carries.
pub fn resolve(keys: &JwtKeys, token: &str) -> Result<Identity, ApiError> {
    match keys.verify(token) {
        Ok(claims) => Ok(claims.into()),
        Err(e) => {
            warn!(error = %e, "invalid or expired token");
            Err(ApiError::Unauthenticated("Token is not valid".into()))
        }
    }
}

pub async fn register(st: &AppState, req: SignupRequest) -> Result<(String, User), ApiError> {
    let (input, password) = validate_signup(&req)?;

    // Fast path; the store's uniqueness check below is the authoritative one.
    if st.users.find_by_email(&input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(ApiError::DuplicateIdentity);
    }

    let password_hash = hash_password_blocking(password).await?;
    let user = st
        .users
        .create(NewUser {
            name: input.name,
            email: input.email.clone(),
            password_hash,
            role: input.role,
        })
        .await?
        .ok_or_else(|| {
            warn!(email = %input.email, "email registered concurrently");
            ApiError::DuplicateIdentity
        })?;

    let token = issue_token(&JwtKeys::from_ref(st), &Identity::from(&user))?;
    info!(user_id = %user.id, role = ?user.role, "user registered");
    Ok((token, user))
}

pub async fn authenticate(st: &AppState, req: LoginRequest) -> Result<(String, User), ApiError> {
    let email = normalize_email(&req.email);
    let mut errors = Vec::new();
    if !is_valid_email(&email) {
        errors.push(FieldError::body("email", "Valid email is required"));
    }
    let Some(password) = req.password else {
        errors.push(FieldError::body("password", "Password is required"));
        return Err(ApiError::validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    // Unknown email and wrong password deliberately produce the same error.
    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&JwtKeys::from_ref(st), &Identity::from(&user))?;
    info!(user_id = %user.id, "user logged in");
    Ok((token, user))
}

pub async fn profile(st: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    st.users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}
