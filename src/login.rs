#[cfg(feature = "web")]
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
#[cfg(feature = "web")]
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::info;
#[cfg(feature = "web")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "web")]
use crate::app::{ApiResponse, SharedState};
#[cfg(feature = "web")]
use crate::error::AppError;
use crate::error::AuthError;
use crate::tokens::{TokenIssuer, TokenPair};
use crate::users::{PublicUser, UserStore};

#[cfg(feature = "web")]
const ACCESS_COOKIE: &str = "accessToken";
#[cfg(feature = "web")]
const REFRESH_COOKIE: &str = "refreshToken";

/// Account operations: the user database plus token issuing
pub struct AuthService {
    users: UserStore,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(users: UserStore, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, AuthError> {
        self.users.register(username, email, password).await
    }

    /// Verify credentials and start a session
    ///
    /// The new refresh token replaces any previously accepted one.
    ///
    /// # Returns
    /// * `Result<(PublicUser, TokenPair), AuthError>` - The user and their new tokens
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<(PublicUser, TokenPair), AuthError> {
        let user = self.users.verify_login(username, email, password).await?;
        let tokens = self.tokens.issue(&user)?;
        self.users
            .set_refresh_token(&user.id, Some(tokens.refresh_token.clone()))
            .await?;

        info!("User {} logged in", user.username);
        Ok((PublicUser::from(&user), tokens))
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Each refresh token works once: it must match the one stored for the
    /// user, and is replaced by the newly issued one.
    ///
    /// # Errors
    /// * `AuthError::Unauthorized` if the token does not verify, belongs to no
    ///   user, or has already been used
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let user = self
            .users
            .find(&claims.sub)
            .await
            .ok_or_else(|| AuthError::Unauthorized("Invalid refresh token".to_string()))?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(AuthError::Unauthorized(
                "Refresh token is expired or used".to_string(),
            ));
        }

        let tokens = self.tokens.issue(&user)?;
        self.users
            .set_refresh_token(&user.id, Some(tokens.refresh_token.clone()))
            .await?;
        Ok(tokens)
    }

    pub async fn logout(&self, user_id: &str) -> Result<(), AuthError> {
        self.users.set_refresh_token(user_id, None).await
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.users
            .change_password(user_id, old_password, new_password)
            .await
    }

    pub async fn update_account(
        &self,
        user_id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<PublicUser, AuthError> {
        let user = self.users.update_account(user_id, full_name, email).await?;
        info!("User {} updated account details", user.username);
        Ok(user)
    }

    /// Resolve an access token to the user it was issued for
    ///
    /// # Errors
    /// * `AuthError::Forbidden` if the token does not verify
    /// * `AuthError::Unauthorized` if the user no longer exists
    pub async fn authenticate(&self, access_token: &str) -> Result<PublicUser, AuthError> {
        let claims = self.tokens.verify_access(access_token)?;
        self.users
            .find(&claims.sub)
            .await
            .map(|user| PublicUser::from(&user))
            .ok_or_else(|| AuthError::Unauthorized("user not found".to_string()))
    }
}

// Web handler functions below (only compiled with "web" feature)

/// The authenticated caller, inserted by [`require_auth`]
#[cfg(feature = "web")]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub PublicUser);

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    #[serde(alias = "oldPassword")]
    pub old_password: String,
    #[serde(alias = "newPassword")]
    pub new_password: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default, alias = "fullName")]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

#[cfg(feature = "web")]
#[derive(Debug, Serialize)]
pub struct LoginData {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Pull the access token from the cookie or an `Authorization: Bearer` header
#[cfg(feature = "web")]
fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(feature = "web")]
fn auth_cookie(
    name: &'static str,
    value: String,
    ttl_secs: u64,
    secure: bool,
) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));

    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Set both token cookies, each living as long as its token
#[cfg(feature = "web")]
fn with_token_cookies(
    jar: CookieJar,
    issuer: &TokenIssuer,
    tokens: &TokenPair,
    secure: bool,
) -> CookieJar {
    jar.add(auth_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        issuer.access_ttl_secs(),
        secure,
    ))
    .add(auth_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        issuer.refresh_ttl_secs(),
        secure,
    ))
}

/// Authentication middleware
///
/// Resolves the access token to a user and stores it in the request
/// extensions as [`CurrentUser`]. Rejects with 401 when no token is present
/// and 403 when the token is invalid.
#[cfg(feature = "web")]
pub async fn require_auth(
    State(state): State<SharedState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = access_token(&jar, request.headers()) else {
        return AuthError::Unauthorized("authorization denied".to_string()).into_response();
    };

    match state.auth.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Handle user registration
#[cfg(feature = "web")]
pub async fn handle_register(
    State(state): State<SharedState>,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), AppError> {
    let user = state
        .auth
        .register(&form.username, &form.email, &form.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(user, "User registered successfully"),
    ))
}

/// Handle user login requests
///
/// Sets `accessToken` and `refreshToken` cookies and also returns both
/// tokens in the body for clients that use the `Authorization` header.
#[cfg(feature = "web")]
pub async fn handle_login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginData>>), AppError> {
    let (user, tokens) = state
        .auth
        .login(form.username.as_deref(), form.email.as_deref(), &form.password)
        .await?;

    let jar = with_token_cookies(
        jar,
        state.auth.tokens(),
        &tokens,
        state.config.secure_cookies,
    );
    Ok((
        jar,
        ApiResponse::ok(LoginData { user, tokens }, "User logged in successfully"),
    ))
}

/// Handle user logout
///
/// Revokes the stored refresh token and clears both cookies.
#[cfg(feature = "web")]
pub async fn handle_logout(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<()>>), AppError> {
    state.auth.logout(&user.id).await?;
    info!("User {} logged out", user.username);

    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    Ok((jar, ApiResponse::<()>::message("User logged out successfully")))
}

/// Handle token refresh
///
/// Accepts the refresh token from the cookie or a JSON body `{ "refreshToken": ... }`.
#[cfg(feature = "web")]
pub async fn handle_refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<ApiResponse<TokenPair>>), AppError> {
    let from_cookie = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let from_body = body.and_then(|Json(b)| b.refresh_token);

    let Some(incoming) = from_cookie.or(from_body) else {
        return Err(AuthError::Unauthorized("Unauthorized request".to_string()).into());
    };

    let tokens = state.auth.refresh(&incoming).await?;
    let jar = with_token_cookies(
        jar,
        state.auth.tokens(),
        &tokens,
        state.config.secure_cookies,
    );
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

/// Handle password change for authenticated users
#[cfg(feature = "web")]
pub async fn handle_change_password(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<PasswordChangeRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state
        .auth
        .change_password(&user.id, &form.old_password, &form.new_password)
        .await?;

    Ok(ApiResponse::<()>::message("Password changed successfully"))
}

/// Handle account detail updates (display name and email)
#[cfg(feature = "web")]
pub async fn handle_update_account(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, AppError> {
    let updated = state
        .auth
        .update_account(&user.id, &form.full_name, &form.email)
        .await?;

    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}

#[cfg(feature = "web")]
pub async fn handle_current_user(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<PublicUser>> {
    ApiResponse::ok(user, "Current user fetched successfully")
}
