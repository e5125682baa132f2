use std::collections::HashMap;
use std::path::{Path, PathBuf};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AuthError, StoreError};

const USERS_FILE: &str = "users.json";

/// User data structure representing a registered application user
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    /// Stable identifier, referenced by chart documents
    pub id: String,

    /// Username (stored lowercase, unique)
    pub username: String,

    /// Email address (unique)
    pub email: String,

    /// Display name, set through account updates
    #[serde(default)]
    pub full_name: Option<String>,

    /// Argon2 hash of the user's password
    pub password_hash: String,

    /// Refresh token currently accepted for this user, if logged in
    pub refresh_token: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// What a client may see of a user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
        }
    }
}

/// JSON-file user database
///
/// The whole map is held in memory behind a mutex and rewritten to
/// `<data_dir>/users.json` after every change.
pub struct UserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, User>>,
}

impl UserStore {
    /// Initialize the database structure
    ///
    /// Creates the data directory and an empty users file if they don't
    /// exist, then loads every user.
    ///
    /// # Errors
    /// * `StoreError` if the directory or file cannot be created, read or parsed
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(data_dir.as_ref()).await?;
        let path = data_dir.as_ref().join(USERS_FILE);

        let users = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::write(&path, b"{}").await?;
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    async fn persist(&self, users: &HashMap<String, User>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(users)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Write `next` to disk, then make it the in-memory state
    ///
    /// On a failed write the in-memory map is left as it was, so memory never
    /// holds a change that `users.json` does not.
    async fn commit(
        &self,
        users: &mut HashMap<String, User>,
        next: HashMap<String, User>,
    ) -> Result<(), StoreError> {
        self.persist(&next).await?;
        *users = next;
        Ok(())
    }

    /// Register a new user
    ///
    /// # Errors
    /// * `AuthError::Validation` if any field is blank
    /// * `AuthError::Conflict` if the username or email is already in use
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, AuthError> {
        let username = username.trim().to_lowercase();
        let email = email.trim().to_string();

        if username.is_empty() || email.is_empty() || password.trim().is_empty() {
            return Err(AuthError::Validation("All fields are required".to_string()));
        }

        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(AuthError::Conflict);
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            full_name: None,
            password_hash: hash_password(password)?,
            refresh_token: None,
            created_at: Utc::now(),
        };
        let public = PublicUser::from(&user);

        let mut next = users.clone();
        next.insert(user.id.clone(), user);
        self.commit(&mut users, next).await?;

        info!("Registered user {}", public.username);
        Ok(public)
    }

    /// Verify credentials, looking the user up by username or email
    ///
    /// # Errors
    /// * `AuthError::Validation` if neither identifier is given
    /// * `AuthError::UserNotFound` if no user matches
    /// * `AuthError::InvalidCredentials` if the password is wrong
    pub async fn verify_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<User, AuthError> {
        let username = username.map(|u| u.trim().to_lowercase()).filter(|u| !u.is_empty());
        let email = email.map(str::trim).filter(|e| !e.is_empty());

        if username.is_none() && email.is_none() {
            return Err(AuthError::Validation(
                "Username or email is required".to_string(),
            ));
        }

        let users = self.users.lock().await;
        let user = users
            .values()
            .find(|u| {
                username.as_deref() == Some(u.username.as_str()) || email == Some(u.email.as_str())
            })
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user.clone())
    }

    pub async fn find(&self, id: &str) -> Option<User> {
        self.users.lock().await.get(id).cloned()
    }

    /// Replace (or clear) the accepted refresh token
    pub async fn set_refresh_token(
        &self,
        id: &str,
        token: Option<String>,
    ) -> Result<(), AuthError> {
        let mut users = self.users.lock().await;
        let mut next = users.clone();
        let user = next.get_mut(id).ok_or(AuthError::UserNotFound)?;
        user.refresh_token = token;
        self.commit(&mut users, next).await?;
        Ok(())
    }

    /// Change a password after checking the current one
    ///
    /// # Errors
    /// * `AuthError::Validation` if the old password is wrong or the new one is blank
    pub async fn change_password(
        &self,
        id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.trim().is_empty() {
            return Err(AuthError::Validation(
                "New password cannot be empty".to_string(),
            ));
        }

        let mut users = self.users.lock().await;
        let mut next = users.clone();
        let user = next.get_mut(id).ok_or(AuthError::UserNotFound)?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(AuthError::Validation("Invalid old password".to_string()));
        }

        user.password_hash = hash_password(new_password)?;
        self.commit(&mut users, next).await?;
        Ok(())
    }

    /// Update the display name and email of an account
    ///
    /// # Errors
    /// * `AuthError::Validation` if either field is blank
    /// * `AuthError::Conflict` if another user already has the email
    /// * `AuthError::UserNotFound` if the id is unknown
    pub async fn update_account(
        &self,
        id: &str,
        full_name: &str,
        email: &str,
    ) -> Result<PublicUser, AuthError> {
        let full_name = full_name.trim();
        let email = email.trim();

        if full_name.is_empty() || email.is_empty() {
            return Err(AuthError::Validation(
                "Full name and email are required".to_string(),
            ));
        }

        let mut users = self.users.lock().await;
        if users.values().any(|u| u.id != id && u.email == email) {
            return Err(AuthError::Conflict);
        }

        let mut next = users.clone();
        let user = next.get_mut(id).ok_or(AuthError::UserNotFound)?;
        user.full_name = Some(full_name.to_string());
        user.email = email.to_string();
        let public = PublicUser::from(&*user);

        self.commit(&mut users, next).await?;
        Ok(public)
    }
}

/// Hash a password using Argon2
///
/// # Errors
/// * `AuthError::Hashing` if the password hashing fails
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hashing)
}

/// Verify a password against a stored hash
///
/// # Returns
/// * `Result<bool, AuthError>` - True if the password matches, false if not
///
/// # Errors
/// * `AuthError::Hashing` if the stored hash is in an invalid format
fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::Hashing)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
