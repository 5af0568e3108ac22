use crate::config::AppConfig;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use serde::Deserialize;

pub mod models;
mod utils;

use self::models::User;
use self::utils::*;

/// Guard for routes that require a caller. Routes where the caller is
/// optional take `Option<User>` instead, which turns every failure into
/// an anonymous request.
pub type CurrentUser = Result<User, ApiError>;

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for Registration {
    type Error = ApiError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        for check in [
            validate_email(&self.user.email, None, connection),
            validate_username(&self.user.username, None, connection),
        ] {
            match check {
                Ok(_) => {}
                Err(ApiError::Validation(e)) => errors.merge(e),
                Err(other) => return Err(other),
            }
        }

        if let Err(e) = validate_password(&self.user.password) {
            errors.merge(e);
        }

        errors.into_result(self).map_err(|e| e.into())
    }
}

#[post("/users", format = "json", data = "<registration>")]
pub async fn register(
    connection: DbConnection,
    config: &State<AppConfig>,
    registration: Json<Registration>,
) -> ApiResult<Value> {
    let config = config.inner().clone();
    connection
        .run(move |connection| -> ApiResult<Value> {
            let registration = registration.validate(connection)?.into_inner();
            let new_user = models::NewUser {
                username: registration.user.username,
                email: registration.user.email,
                password_hash: User::make_password(&registration.user.password)?,
            };

            let user = User::create(&new_user, connection)?;
            let user = user.with_token(&config.jwt_secret, config.token_ttl_days)?;
            Ok(Json(json!({ "user": user })))
        })
        .await?
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

fn bearer_token(header: &str) -> Option<&str> {
    header.split_whitespace().nth(1)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match request.headers().get_one("Authorization").and_then(bearer_token) {
            Some(token) => token,
            None => return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        };

        let config = match request.guard::<&State<AppConfig>>().await {
            Outcome::Success(config) => config,
            _ => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };

        let connection = match DbConnection::from_request(request).await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, ApiError::Internal)),
        };

        let token = token.to_string();
        let secret = config.jwt_secret.clone();
        let loaded = connection
            .run(move |connection| User::load_from_token(&token, &secret, connection))
            .await
            .and_then(|loaded| loaded);
        match loaded {
            Ok(user) => Outcome::Success(user),
            Err(ApiError::Validation(_)) => {
                log::warn!("rejected bearer token for {}", request.uri());
                Outcome::Error((Status::Unauthorized, ApiError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

#[post("/users/login", format = "json", data = "<login>")]
pub async fn login(connection: DbConnection, config: &State<AppConfig>, login: Json<Login>) -> ApiResult<Value> {
    let config = config.inner().clone();
    connection
        .run(move |connection| -> ApiResult<Value> {
            let invalid = || ValidationError::from("email or password", "is invalid");

            let user = User::load_by_email(&login.user.email, connection)?.ok_or_else(invalid)?;
            if !user.verify_password(&login.user.password)? {
                return Err(invalid().into());
            }
            let user = user.with_token(&config.jwt_secret, config.token_ttl_days)?;
            Ok(Json(json!({ "user": user })))
        })
        .await?
}

#[get("/user")]
pub fn current(user: CurrentUser, config: &State<AppConfig>) -> ApiResult<Value> {
    let user = user?;
    let user = user.with_token(&config.jwt_secret, config.token_ttl_days)?;
    Ok(Json(json!({ "user": user })))
}

/// The fields a user may change about themselves.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub user: UserPatch,
}

#[put("/user", format = "json", data = "<update>")]
pub async fn update(
    current_user: CurrentUser,
    connection: DbConnection,
    config: &State<AppConfig>,
    update: Json<Update>,
) -> ApiResult<Value> {
    let user = current_user?;
    let config = config.inner().clone();
    let patch = update.into_inner().user;
    connection
        .run(move |connection| apply_patch(user, patch, &config, connection))
        .await?
}

fn apply_patch(
    mut user: User,
    patch: UserPatch,
    config: &AppConfig,
    connection: &mut SqliteConnection,
) -> ApiResult<Value> {
    let mut error = ValidationError::default();

    if let Some(bio) = patch.bio {
        user.bio = Some(bio);
    }
    if let Some(image) = patch.image {
        user.image = Some(image);
    }

    if let Some(new_email) = patch.email {
        match validate_email(&new_email, Some(user.id), connection) {
            Ok(_) => user.email = new_email,
            Err(ApiError::Validation(e)) => error.merge(e),
            Err(other) => return Err(other),
        }
    }

    if let Some(new_username) = patch.username {
        match validate_username(&new_username, Some(user.id), connection) {
            Ok(_) => user.username = new_username,
            Err(ApiError::Validation(e)) => error.merge(e),
            Err(other) => return Err(other),
        }
    }

    if let Some(new_password) = patch.password {
        match validate_password(&new_password) {
            Ok(_) => user.new_password(&new_password)?,
            Err(e) => error.merge(e),
        }
    }

    if !error.empty() {
        return Err(error.into());
    }

    diesel::update(&user).set(&user).execute(connection)?;
    let user = user.with_token(&config.jwt_secret, config.token_ttl_days)?;
    Ok(Json(json!({ "user": user })))
}
