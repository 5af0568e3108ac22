use crate::db::DbConnection;
use crate::types::*;
use crate::users::models::User;
use crate::users::CurrentUser;
use diesel::sqlite::SqliteConnection;
use rocket::serde::json::{json, Json, Value};
use serde::Deserialize;

pub mod favorites;
pub mod models;
pub mod query;

use self::models::{Article, ArticleDetails, ArticlePatch, ArticleResponse, ArticleView};
use self::query::{list_articles, ArticleFilter, ArticleList};

/// Request bodies arrive wrapped as `{"article": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ArticleEnvelope<T> {
    article: T,
}

impl<T: Validate<Error = ValidationError>> Validate for ArticleEnvelope<T> {
    type Error = ValidationError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, ValidationError> {
        Ok(ArticleEnvelope {
            article: self.article.validate(connection)?,
        })
    }
}

fn respond(
    article: Article,
    viewer: Option<&User>,
    connection: &mut SqliteConnection,
) -> ApiResult<ArticleResponse> {
    let article = ArticleView::load(article, viewer, connection)?;
    Ok(Json(ArticleResponse { article }))
}

#[get("/articles?<filter..>")]
pub async fn list(connection: DbConnection, viewer: Option<User>, filter: ArticleFilter) -> ApiResult<ArticleList> {
    connection
        .run(move |connection| -> ApiResult<ArticleList> {
            let list = list_articles(&filter, viewer.as_ref(), connection)?;
            Ok(Json(list))
        })
        .await?
}

#[get("/articles/<slug>")]
pub async fn get(slug: String, connection: DbConnection, viewer: Option<User>) -> ApiResult<ArticleResponse> {
    connection
        .run(move |connection| -> ApiResult<ArticleResponse> {
            let article = Article::find_by_slug(&slug, connection)?;
            respond(article, viewer.as_ref(), connection)
        })
        .await?
}

#[post("/articles", format = "json", data = "<create>")]
pub async fn create(
    connection: DbConnection,
    user: CurrentUser,
    create: Json<ArticleEnvelope<ArticleDetails>>,
) -> ApiResult<ArticleResponse> {
    let user = user?;
    connection
        .run(move |connection| -> ApiResult<ArticleResponse> {
            let create = create.validate(connection)?.into_inner();
            let article = Article::create(&user, create.article, connection)?;
            respond(article, Some(&user), connection)
        })
        .await?
}

#[put("/articles/<slug>", format = "json", data = "<update>")]
pub async fn update(
    slug: String,
    connection: DbConnection,
    user: CurrentUser,
    update: Json<ArticleEnvelope<ArticlePatch>>,
) -> ApiResult<ArticleResponse> {
    let user = user?;
    connection
        .run(move |connection| -> ApiResult<ArticleResponse> {
            let update = update.validate(connection)?.into_inner();
            let article = Article::update(&slug, user.id, update.article, connection)?;
            respond(article, Some(&user), connection)
        })
        .await?
}

#[delete("/articles/<slug>")]
pub async fn delete(slug: String, connection: DbConnection, user: CurrentUser) -> ApiResult<Value> {
    let user = user?;
    connection
        .run(move |connection| -> ApiResult<Value> {
            Article::delete(&slug, user.id, connection)?;
            Ok(Json(json!({ "article": { "slug": slug, "deleted": true } })))
        })
        .await?
}

#[post("/articles/<slug>/favorite")]
pub async fn favorite(slug: String, connection: DbConnection, user: CurrentUser) -> ApiResult<ArticleResponse> {
    let user = user?;
    connection
        .run(move |connection| -> ApiResult<ArticleResponse> {
            let article = favorites::add_to_favorites(&slug, user.id, connection)?;
            respond(article, Some(&user), connection)
        })
        .await?
}

#[delete("/articles/<slug>/favorite")]
pub async fn unfavorite(slug: String, connection: DbConnection, user: CurrentUser) -> ApiResult<ArticleResponse> {
    let user = user?;
    connection
        .run(move |connection| -> ApiResult<ArticleResponse> {
            let article = favorites::remove_from_favorites(&slug, user.id, connection)?;
            respond(article, Some(&user), connection)
        })
        .await?
}
