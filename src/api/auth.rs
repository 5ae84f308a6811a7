use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{
    AuthSession as AuthSessionSchema, Login, Refresh, Revocation, TokenStatus as TokenStatusSchema,
    UserSummary as UserSummarySchema, Validate,
};
use crate::domain::auth_session::{AuthSession, RefreshOutcome, TokenStatus};
use crate::error::{AppError, Result};
use axum::{Json, extract::State, response::IntoResponse};

pub async fn login(State(state): State<AppState>, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    let session = state.auth_service.login(&payload.username, &payload.password).await?;
    Ok(Json(map_session(session)))
}

pub async fn refresh(State(state): State<AppState>, Json(payload): Json<Refresh>) -> Result<impl IntoResponse> {
    match state.auth_service.refresh(&payload.access_token, &payload.refresh_token).await? {
        RefreshOutcome::Renewed(session) => Ok(Json(map_session(session))),
        RefreshOutcome::Invalid => Err(AppError::AuthError),
    }
}

pub async fn validate(State(state): State<AppState>, Json(payload): Json<Validate>) -> impl IntoResponse {
    Json(map_status(state.auth_service.validate(&payload.token)))
}

pub async fn logout(auth_user: AuthUser, State(state): State<AppState>) -> impl IntoResponse {
    let revoked = state.auth_service.revoke_all(auth_user.user_id).await;
    Json(Revocation { revoked })
}

fn map_session(session: AuthSession) -> AuthSessionSchema {
    AuthSessionSchema {
        token: session.token,
        refresh_token: session.refresh_token,
        expires_at: session.expires_at.unix_timestamp(),
        user: UserSummarySchema {
            id: session.user.id,
            username: session.user.username,
            email: session.user.email,
            first_name: session.user.first_name,
            last_name: session.user.last_name,
            roles: session.user.roles.into_iter().collect(),
        },
        redirect_to: session.redirect_to,
    }
}

fn map_status(status: TokenStatus) -> TokenStatusSchema {
    TokenStatusSchema {
        valid: status.valid,
        user_id: status.user_id,
        username: status.username,
        remaining_seconds: status.remaining_seconds,
    }
}
