use crate::db::DbConnection;
use crate::types::*;
use crate::users::models::User;
use rocket::serde::json::Json;
use serde::Serialize;
use std::borrow::Cow;

#[derive(Debug, Serialize)]
pub struct ProfileResponse<'a> {
    profile: Profile<'a>,
}

/// Public view of a user, embedded as the author of every article.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
}

impl From<User> for Profile<'static> {
    fn from(user: User) -> Self {
        Profile {
            username: Cow::Owned(user.username),
            bio: user.bio.map(Cow::Owned),
            image: user.image.map(Cow::Owned),
        }
    }
}

#[get("/profiles/<name>")]
pub async fn profile(connection: DbConnection, name: String) -> ApiResult<ProfileResponse<'static>> {
    let user = connection
        .run(move |connection| User::load_by_name(&name, connection))
        .await??
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(ProfileResponse {
        profile: user.into(),
    }))
}
