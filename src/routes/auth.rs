/// Authentication Routes
///
/// Login, registration, token refresh, logout and current-user information.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Identity, Registration, Session, TokenAuthority};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::middleware::bearer_token;
use crate::validators::{is_valid_email, is_valid_phone, require_field};

/// Login request. Fields are optional so a missing one is a 400, not a parse failure.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Registration / signup request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub principal_id: Uuid,
}

/// Token pair handed to the client after login or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub name: String,
    pub access: String,
    pub refresh: String,
    #[serde(rename = "principalId")]
    pub principal_id: Uuid,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self {
            name: session.identity.email,
            access: session.tokens.access_token,
            refresh: session.tokens.refresh_token,
            principal_id: session.identity.id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub principal_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// User information response
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
}

fn required_password(value: Option<&str>) -> Result<String, ValidationError> {
    // Passwords are taken verbatim; whitespace is significant.
    match value {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::EmptyField("password".to_string())),
    }
}

fn registration(form: &RegisterRequest) -> Result<Registration, AppError> {
    let email = is_valid_email(&require_field("email", form.email.as_deref())?)?;
    let phone = is_valid_phone(&require_field("phone", form.phone.as_deref())?)?;
    let password = required_password(form.password.as_deref())?;

    Ok(Registration {
        email,
        phone,
        password,
    })
}

/// POST /api/user/login
///
/// # Errors
/// - 400: missing email or password
/// - 401: `INVALID_CREDENTIALS`, identical for unknown email and wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = require_field("email", form.email.as_deref())?;
    let password = required_password(form.password.as_deref())?;

    let session = authority.login(&email, &password).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %session.identity.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

/// POST /api/user/register
///
/// Creates a principal and returns its id. No tokens are issued.
///
/// # Errors
/// - 400: validation errors
/// - 409: `USER_EXISTS`
pub async fn register(
    form: web::Json<RegisterRequest>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let principal = authority.register(registration(&form)?).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %principal.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(RegisterResponse {
        principal_id: principal.id,
    }))
}

/// POST /api/user/signup
///
/// Same creation path as register; answers with a confirmation message only.
pub async fn signup(
    form: web::Json<RegisterRequest>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_signup");

    let principal = authority.register(registration(&form)?).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = %context.operation,
        user_id = %principal.id,
        "User signed up successfully"
    );

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "User created successfully".to_string(),
    }))
}

/// POST /api/user/refresh
///
/// Takes the refresh token as a bearer credential and answers with a rotated pair.
/// The presented token is invalid from then on.
///
/// # Errors
/// - 401 `NO_TOKEN_FOUND`: no bearer header
/// - 401 `REFRESH_TOKEN_EXPIRED`
/// - 401 `INVALID_REFRESH_TOKEN` with detail `MALFORMED`, `TOKEN_MISMATCH` or `NOT_FOUND`
pub async fn refresh(
    req: HttpRequest,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AuthError::NoToken)?;
    let session = authority.refresh(&token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(session)))
}

/// POST /api/user/logout
///
/// Clears the refresh slot of the principal named in the body. The caller must hold a
/// valid access token, but the body id is what gets logged out.
pub async fn logout(
    identity: web::ReqData<Identity>,
    form: web::Json<LogoutRequest>,
    authority: web::Data<TokenAuthority>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout").with_user_id(identity.id.to_string());

    if identity.id != form.principal_id {
        tracing::warn!(
            request_id = %context.request_id,
            operation = %context.operation,
            user_id = %identity.id,
            target_id = %form.principal_id,
            "Logout requested for a different principal"
        );
    }

    authority.logout(form.principal_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// GET /api/user/me
pub async fn current_user(identity: web::ReqData<Identity>) -> HttpResponse {
    let identity = identity.into_inner();
    HttpResponse::Ok().json(UserResponse {
        id: identity.id,
        email: identity.email,
    })
}
