//! Favorite membership and the `favorites_count` cached on each article.
//!
//! The membership row and the counter always change inside one immediate
//! transaction, and the counter only moves when a row was actually inserted
//! or deleted. Repeating a favorite or an unfavorite is therefore a no-op.

use super::models::Article;
use crate::db::schema::{articles, favorites};
use crate::types::ApiError;
use crate::users::models::User;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

fn require_user(user_id: i32, connection: &mut SqliteConnection) -> Result<User, ApiError> {
    User::find(user_id, connection)?.ok_or(ApiError::NotFound("user"))
}

pub fn add_to_favorites(slug: &str, user_id: i32, connection: &mut SqliteConnection) -> Result<Article, ApiError> {
    connection.immediate_transaction(|connection| {
        let article = Article::find_by_slug(slug, connection)?;
        let user = require_user(user_id, connection)?;

        let inserted = diesel::insert_into(favorites::table)
            .values((favorites::user_id.eq(user.id), favorites::article_id.eq(article.id)))
            .on_conflict((favorites::user_id, favorites::article_id))
            .do_nothing()
            .execute(connection)?;
        if inserted == 0 {
            return Ok(article);
        }

        let article = diesel::update(&article)
            .set(articles::favorites_count.eq(articles::favorites_count + 1))
            .get_result::<Article>(connection)?;
        log::info!("user {} favorited {}", user.username, article.slug);
        Ok(article)
    })
}

pub fn remove_from_favorites(slug: &str, user_id: i32, connection: &mut SqliteConnection) -> Result<Article, ApiError> {
    connection.immediate_transaction(|connection| {
        let article = Article::find_by_slug(slug, connection)?;
        let user = require_user(user_id, connection)?;

        let removed = diesel::delete(favorites::table.find((user.id, article.id))).execute(connection)?;
        if removed == 0 {
            return Ok(article);
        }

        let article = diesel::update(&article)
            .set(articles::favorites_count.eq(articles::favorites_count - 1))
            .get_result::<Article>(connection)?;
        log::info!("user {} unfavorited {}", user.username, article.slug);
        Ok(article)
    })
}
