use crate::db::schema::users;
use crate::types::{ApiError, ValidationError};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, AsChangeset, Serialize)]
#[diesel(table_name = users, check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// Claims carried by the bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id: i32,
    pub username: String,
    pub exp: i64,
}

/// The user as returned by the user endpoints, token included.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser<'a> {
    #[serde(flatten)]
    pub user: &'a User,
    pub token: String,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                log::error!("password hashing failed: {}", e);
                ApiError::Internal
            })
    }

    pub fn new_password(&mut self, password: &str) -> Result<(), ApiError> {
        self.password_hash = User::make_password(password)?;
        Ok(())
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(&self.password_hash).map_err(|_| ApiError::Internal)?;
        Ok(Argon2::default()
            .verify_password(password_to_verify.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn token(&self, secret: &str, ttl_days: i64) -> Result<String, ApiError> {
        let claims = Claims {
            id: self.id,
            username: self.username.clone(),
            exp: (Utc::now() + Duration::days(ttl_days)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| {
            log::error!("token signing failed: {}", e);
            ApiError::Internal
        })
    }

    pub fn with_token(&self, secret: &str, ttl_days: i64) -> Result<AuthenticatedUser<'_>, ApiError> {
        Ok(AuthenticatedUser {
            user: self,
            token: self.token(secret, ttl_days)?,
        })
    }

    /// Resolves a bearer token to the user it was issued for. Bad signatures,
    /// expired tokens and tokens of vanished users are all validation errors.
    pub fn load_from_token(
        jwt_token: &str,
        secret: &str,
        connection: &mut SqliteConnection,
    ) -> Result<User, ApiError> {
        let data = decode::<Claims>(
            jwt_token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ValidationError::from("token", "Invalid jwt token"))?;

        User::find(data.claims.id, connection)?
            .ok_or_else(|| ValidationError::from("token", "Unknown user").into())
    }

    pub fn find(user_id: i32, connection: &mut SqliteConnection) -> Result<Option<User>, ApiError> {
        users::table
            .find(user_id)
            .first::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> Result<Option<User>, ApiError> {
        users::table
            .filter(users::username.eq(name))
            .first::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn load_by_email(email: &str, connection: &mut SqliteConnection) -> Result<Option<User>, ApiError> {
        users::table
            .filter(users::email.eq(email))
            .first::<User>(connection)
            .optional()
            .map_err(|e| e.into())
    }

    pub fn create(new_user: &NewUser, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        let user = diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(connection)?;
        log::info!("registered user {}", user.username);
        Ok(user)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
