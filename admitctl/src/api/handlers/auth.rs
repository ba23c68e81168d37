use axum::{Json, extract::State};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse},
        users::{CurrentUser, UserResponse, UserStatus},
    },
    auth::{password, session},
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::{Error, Result},
    types::abbrev_uuid,
};

/// Register a new account. The account stays pending until an admin approves it.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    tag = "authentication",
    summary = "Register",
    responses(
        (status = 200, description = "Registration submitted for approval", body = RegisterResponse),
        (status = 400, description = "Invalid input, duplicate username or registration disabled"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<Json<RegisterResponse>> {
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let request = request.normalized()?;
    password::validate_password(&request.password, &state.config.auth.password)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing) = user_repo.get_user_by_username(&request.username).await? {
        let message = if existing.status == UserStatus::Pending {
            "A registration for this username is already pending approval"
        } else {
            "Username already registered"
        };
        return Err(Error::BadRequest {
            message: message.to_string(),
        });
    }

    let password_hash = password::hash_password(request.password.clone()).await?;
    let created = user_repo
        .create(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            role: request.role,
            agent_code: request.agent_code,
            status: UserStatus::Pending,
            password_hash,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = %abbrev_uuid(&created.id), role = ?created.role, "Registration submitted");

    Ok(Json(RegisterResponse {
        message: "Registration submitted. Your account is pending admin approval.".to_string(),
        user_id: created.id,
        status: created.status,
    }))
}

/// Exchange username and password for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    summary = "Login",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials or account not active"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<TokenResponse>> {
    let invalid = || Error::Unauthenticated {
        message: Some("Incorrect username or password".to_string()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_user_by_username(request.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(request.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    match user.status {
        UserStatus::Active => {}
        UserStatus::Pending => {
            return Err(Error::Unauthenticated {
                message: Some("Your account is pending admin approval".to_string()),
            });
        }
        UserStatus::Rejected => {
            return Err(Error::Unauthenticated {
                message: Some("Your registration was rejected".to_string()),
            });
        }
    }

    let current_user = CurrentUser::from(user);
    let access_token = session::create_session_token(&current_user, &state.config)?;
    info!(user_id = %abbrev_uuid(&current_user.id), "Login");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: current_user.role,
        user_id: current_user.id,
        username: current_user.username,
    }))
}

/// Tokens are stateless; the client discards its copy
#[utoipa::path(
    post,
    path = "/logout",
    tag = "authentication",
    summary = "Logout",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(current_user: CurrentUser) -> Result<Json<MessageResponse>> {
    info!(user_id = %abbrev_uuid(&current_user.id), "Logout");
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "authentication",
    summary = "Get current user",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(UserResponse::from(user)))
}
