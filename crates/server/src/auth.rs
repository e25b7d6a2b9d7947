//! Account endpoints: registration, login, profile edits.
//!
//! - `POST /api/register` — create an account
//! - `POST /api/login`    — verify credentials, stamp last login
//! - `PUT  /api/profile`  — edit profile, optionally rotating the password
//!
//! Passwords are argon2-hashed before they reach storage. There is no token
//! issuance here: the client keeps the returned user record in its own
//! session storage and quotes the user id back on later requests, which the
//! server trusts as coming from its authentication collaborator. The `role`
//! field in the login payload is what the UI branches on for admin screens.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use panaderia_core::auth::{hash_password, verify_password, PasswordError};
use panaderia_core::domain::user::{User, UserId, UserStatus};
use panaderia_core::errors::ApplicationError;
use panaderia_db::repositories::{NewUser, ProfileUpdate, SqlUserRepository, UserStore};
use panaderia_db::DbPool;

use crate::respond::{self, ApiError, ApiMessage};

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Clone)]
pub struct AuthState {
    db_pool: DbPool,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: &'static str,
    pub registered_at: String,
    pub last_login_at: Option<String>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id.0,
            role: user.role.as_str(),
            registered_at: user.registered_at.to_rfc3339(),
            last_login_at: user.last_login_at.map(|stamp| stamp.to_rfc3339()),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub current_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/profile", put(update_profile))
        .with_state(AuthState { db_pool })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<AuthState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, Json<ApiError>)> {
    validate_identity_fields(&body.first_name, &body.last_name, &body.email, &body.phone)?;
    validate_password(&body.password)?;

    let email = body.email.trim().to_ascii_lowercase();
    let repo = SqlUserRepository::new(state.db_pool.clone());

    if repo.email_in_use(&email, None).await.map_err(|error| respond::failure(error.into()))? {
        return Err(respond::bad_request("this email is already registered"));
    }

    let password_hash = hash_password(&body.password).map_err(password_failure)?;
    let user_id = repo
        .create(NewUser {
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email,
            phone: body.phone.trim().to_string(),
            password_hash,
        })
        .await
        .map_err(|error| respond::failure(error.into()))?;

    info!(event_name = "auth.user_registered", user_id = %user_id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "user registered successfully".to_string(),
            user_id: user_id.0,
        }),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ApiError>)> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(respond::bad_request("email and password are required"));
    }

    let email = body.email.trim().to_ascii_lowercase();
    let repo = SqlUserRepository::new(state.db_pool.clone());

    let credentials = repo
        .find_credentials_by_email(&email)
        .await
        .map_err(|error| respond::failure(error.into()))?;

    let Some((user, stored_hash)) = credentials else {
        return Err(respond::unauthorized("email is not registered"));
    };
    if user.status != UserStatus::Active {
        return Err(respond::unauthorized("email is not registered"));
    }

    let valid = verify_password(&stored_hash, &body.password).map_err(password_failure)?;
    if !valid {
        return Err(respond::unauthorized("incorrect password"));
    }

    repo.record_login(user.id).await.map_err(|error| respond::failure(error.into()))?;

    info!(event_name = "auth.user_logged_in", user_id = %user.id, "login succeeded");

    Ok(Json(LoginResponse { success: true, user: UserDto::from(user) }))
}

async fn update_profile(
    State(state): State<AuthState>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ApiMessage>, (StatusCode, Json<ApiError>)> {
    validate_identity_fields(&body.first_name, &body.last_name, &body.email, &body.phone)?;

    let user_id = UserId(body.id);
    let email = body.email.trim().to_ascii_lowercase();
    let repo = SqlUserRepository::new(state.db_pool.clone());

    if repo
        .email_in_use(&email, Some(user_id))
        .await
        .map_err(|error| respond::failure(error.into()))?
    {
        return Err(respond::bad_request("this email is already registered to another account"));
    }

    let user = repo
        .find_by_id(user_id)
        .await
        .map_err(|error| respond::failure(error.into()))?
        .ok_or_else(|| respond::failure(ApplicationError::not_found(format!("user {user_id}"))))?;

    // A password change requires proving knowledge of the current one.
    let password_hash = match (&body.current_password, &body.new_password) {
        (Some(current), Some(new)) => {
            let (_, stored_hash) = repo
                .find_credentials_by_email(&user.email)
                .await
                .map_err(|error| respond::failure(error.into()))?
                .ok_or_else(|| {
                    respond::failure(ApplicationError::not_found(format!("user {user_id}")))
                })?;

            if !verify_password(&stored_hash, current).map_err(password_failure)? {
                return Err(respond::unauthorized("current password is incorrect"));
            }
            validate_password(new)?;
            Some(hash_password(new).map_err(password_failure)?)
        }
        (None, None) => None,
        _ => {
            return Err(respond::bad_request(
                "changing the password requires both current_password and new_password",
            ));
        }
    };

    let updated = repo
        .update_profile(
            user_id,
            ProfileUpdate {
                first_name: body.first_name.trim().to_string(),
                last_name: body.last_name.trim().to_string(),
                email,
                phone: body.phone.trim().to_string(),
                password_hash,
            },
        )
        .await
        .map_err(|error| respond::failure(error.into()))?;

    if !updated {
        return Err(respond::failure(ApplicationError::not_found(format!("user {user_id}"))));
    }

    info!(event_name = "auth.profile_updated", user_id = %user_id, "profile updated");

    Ok(Json(ApiMessage::new("profile updated successfully")))
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_identity_fields(
    first_name: &str,
    last_name: &str,
    email: &str,
    phone: &str,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    if first_name.trim().is_empty()
        || last_name.trim().is_empty()
        || email.trim().is_empty()
        || phone.trim().is_empty()
    {
        return Err(respond::bad_request("all fields are required"));
    }
    if !is_valid_email(email.trim()) {
        return Err(respond::bad_request("email address is invalid"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), (StatusCode, Json<ApiError>)> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(respond::bad_request("password must be at least 6 characters long"));
    }
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn password_failure(error: PasswordError) -> (StatusCode, Json<ApiError>) {
    match error {
        PasswordError::Empty => respond::bad_request("password must not be empty"),
        PasswordError::Hash(detail) | PasswordError::MalformedHash(detail) => {
            respond::failure(ApplicationError::Persistence(detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::Json;

    use super::*;
    use panaderia_db::{connect_with_settings, migrations};

    async fn setup() -> State<AuthState> {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        State(AuthState { db_pool: pool })
    }

    fn registration() -> RegisterRequest {
        RegisterRequest {
            first_name: "Rosa".to_string(),
            last_name: "Miranda".to_string(),
            email: "rosa@example.com".to_string(),
            phone: "5512345678".to_string(),
            password: "pan-dulce-1".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_round_trips() {
        let state = setup().await;

        let (status, registered) =
            register(state.clone(), Json(registration())).await.expect("register");
        assert_eq!(status, StatusCode::CREATED);
        assert!(registered.0.user_id > 0);

        let response = login(
            state,
            Json(LoginRequest {
                email: "Rosa@Example.com".to_string(),
                password: "pan-dulce-1".to_string(),
            }),
        )
        .await
        .expect("login");

        assert!(response.0.success);
        assert_eq!(response.0.user.email, "rosa@example.com");
        assert_eq!(response.0.user.role, "customer");
    }

    #[tokio::test]
    async fn register_rejects_short_passwords() {
        let state = setup().await;
        let mut request = registration();
        request.password = "corto".to_string();

        let (status, body) = register(state, Json(request)).await.expect_err("must fail");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("6 characters"));
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() {
        let state = setup().await;
        let mut request = registration();
        request.email = "not-an-email".to_string();

        let (status, _) = register(state, Json(request)).await.expect_err("must fail");

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_emails() {
        let state = setup().await;
        register(state.clone(), Json(registration())).await.expect("first register");

        let (status, body) =
            register(state, Json(registration())).await.expect_err("duplicate must fail");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0.error.contains("already registered"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let state = setup().await;
        register(state.clone(), Json(registration())).await.expect("register");

        let (status, body) = login(
            state,
            Json(LoginRequest {
                email: "rosa@example.com".to_string(),
                password: "wrong-password".to_string(),
            }),
        )
        .await
        .expect_err("must fail");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.0.error.contains("incorrect password"));
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_unauthorized() {
        let state = setup().await;

        let (status, _) = login(
            state,
            Json(LoginRequest {
                email: "nadie@example.com".to_string(),
                password: "whatever-1".to_string(),
            }),
        )
        .await
        .expect_err("must fail");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_log_in() {
        let state = setup().await;
        register(state.clone(), Json(registration())).await.expect("register");
        sqlx::query("UPDATE users SET status = 'inactive' WHERE email = 'rosa@example.com'")
            .execute(&state.0.db_pool)
            .await
            .expect("deactivate");

        let (status, _) = login(
            state,
            Json(LoginRequest {
                email: "rosa@example.com".to_string(),
                password: "pan-dulce-1".to_string(),
            }),
        )
        .await
        .expect_err("must fail");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn profile_update_changes_fields_without_touching_password() {
        let state = setup().await;
        let (_, registered) =
            register(state.clone(), Json(registration())).await.expect("register");

        let response = update_profile(
            state.clone(),
            Json(UpdateProfileRequest {
                id: registered.0.user_id,
                first_name: "Rosa Maria".to_string(),
                last_name: "Miranda".to_string(),
                email: "rosa.maria@example.com".to_string(),
                phone: "5587654321".to_string(),
                current_password: None,
                new_password: None,
            }),
        )
        .await
        .expect("update");
        assert!(response.0.success);

        // The original password still works against the new email.
        let login_response = login(
            state,
            Json(LoginRequest {
                email: "rosa.maria@example.com".to_string(),
                password: "pan-dulce-1".to_string(),
            }),
        )
        .await
        .expect("login");
        assert_eq!(login_response.0.user.first_name, "Rosa Maria");
    }

    #[tokio::test]
    async fn password_change_requires_the_current_password() {
        let state = setup().await;
        let (_, registered) =
            register(state.clone(), Json(registration())).await.expect("register");

        let (status, _) = update_profile(
            state.clone(),
            Json(UpdateProfileRequest {
                id: registered.0.user_id,
                first_name: "Rosa".to_string(),
                last_name: "Miranda".to_string(),
                email: "rosa@example.com".to_string(),
                phone: "5512345678".to_string(),
                current_password: Some("not-the-password".to_string()),
                new_password: Some("nueva-clave-9".to_string()),
            }),
        )
        .await
        .expect_err("wrong current password must fail");
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        update_profile(
            state.clone(),
            Json(UpdateProfileRequest {
                id: registered.0.user_id,
                first_name: "Rosa".to_string(),
                last_name: "Miranda".to_string(),
                email: "rosa@example.com".to_string(),
                phone: "5512345678".to_string(),
                current_password: Some("pan-dulce-1".to_string()),
                new_password: Some("nueva-clave-9".to_string()),
            }),
        )
        .await
        .expect("correct current password");

        login(
            state,
            Json(LoginRequest {
                email: "rosa@example.com".to_string(),
                password: "nueva-clave-9".to_string(),
            }),
        )
        .await
        .expect("login with rotated password");
    }

    #[tokio::test]
    async fn profile_update_rejects_email_taken_by_another_account() {
        let state = setup().await;
        register(state.clone(), Json(registration())).await.expect("register");
        let mut other = registration();
        other.email = "alma@example.com".to_string();
        let (_, second) = register(state.clone(), Json(other)).await.expect("register other");

        let (status, _) = update_profile(
            state,
            Json(UpdateProfileRequest {
                id: second.0.user_id,
                first_name: "Alma".to_string(),
                last_name: "Delgado".to_string(),
                email: "rosa@example.com".to_string(),
                phone: "5512345678".to_string(),
                current_password: None,
                new_password: None,
            }),
        )
        .await
        .expect_err("must fail");

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn profile_update_of_unknown_user_is_not_found() {
        let state = setup().await;

        let (status, _) = update_profile(
            state,
            Json(UpdateProfileRequest {
                id: 999,
                first_name: "Nadie".to_string(),
                last_name: "Nunca".to_string(),
                email: "nadie@example.com".to_string(),
                phone: "0000000000".to_string(),
                current_password: None,
                new_password: None,
            }),
        )
        .await
        .expect_err("must fail");

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn email_validation_accepts_plausible_addresses_only() {
        assert!(is_valid_email("rosa@example.com"));
        assert!(is_valid_email("rosa.miranda@pan.example.mx"));
        assert!(!is_valid_email("rosa"));
        assert!(!is_valid_email("rosa@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("rosa@example"));
        assert!(!is_valid_email("rosa @example.com"));
        assert!(!is_valid_email("rosa@.com"));
    }
}
