use crate::db::schema::{articles, favorites, users};
use crate::profile::Profile;
use crate::types::*;
use crate::users::models::User;
use crate::utils::{random_suffix, serialize_date};
use chrono::{NaiveDateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteConnection, SqliteValue};
use serde::{Deserialize, Serialize};
use slug::slugify;

/// Ordered tags of an article, stored as the JSON text of the list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct TagList(pub Vec<String>);

impl FromSql<Text, Sqlite> for TagList {
    fn from_sql(value: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Sqlite>>::from_sql(value)?;
        Ok(TagList(serde_json::from_str(&raw)?))
    }
}

impl ToSql<Text, Sqlite> for TagList {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(serde_json::to_string(&self.0)?);
        Ok(IsNull::No)
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: TagList,
    pub favorites_count: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: TagList,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Option<Vec<String>>,
}

/// The fields an author may change on an existing article. Anything else in
/// the request body is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = articles)]
struct ArticleChangeset {
    title: Option<String>,
    description: Option<String>,
    body: Option<String>,
    tag_list: Option<TagList>,
    updated_at: NaiveDateTime,
}

fn require_text(errors: &mut ValidationError, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        if value.trim().is_empty() {
            errors.add_error(field, format!("empty {}", field));
        }
    }
}

impl Validate for ArticleDetails {
    type Error = ValidationError;
    fn validate(self, _connection: &mut SqliteConnection) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        require_text(&mut errors, "title", Some(&self.title));
        require_text(&mut errors, "description", Some(&self.description));
        require_text(&mut errors, "body", Some(&self.body));
        errors.into_result(self)
    }
}

impl Validate for ArticlePatch {
    type Error = ValidationError;
    fn validate(self, _connection: &mut SqliteConnection) -> Result<Self, ValidationError> {
        let mut errors = ValidationError::default();
        require_text(&mut errors, "title", self.title.as_deref());
        require_text(&mut errors, "description", self.description.as_deref());
        require_text(&mut errors, "body", self.body.as_deref());
        errors.into_result(self)
    }
}

pub fn make_slug(title: &str) -> String {
    slugify(title) + "-" + &random_suffix()
}

impl Article {
    pub fn find_by_slug(slug: &str, connection: &mut SqliteConnection) -> Result<Article, ApiError> {
        articles::table
            .filter(articles::slug.eq(slug))
            .first::<Article>(connection)
            .optional()?
            .ok_or(ApiError::NotFound("article"))
    }

    pub fn create(
        author: &User,
        details: ArticleDetails,
        connection: &mut SqliteConnection,
    ) -> Result<Article, ApiError> {
        let now = Utc::now().naive_utc();
        let new_article = NewArticle {
            author_id: author.id,
            slug: make_slug(&details.title),
            title: details.title,
            description: details.description,
            body: details.body,
            tag_list: TagList(details.tag_list.unwrap_or_default()),
            created_at: now,
            updated_at: now,
        };
        let article = diesel::insert_into(articles::table)
            .values(&new_article)
            .get_result::<Article>(connection)?;
        log::info!("user {} created article {}", author.username, article.slug);
        Ok(article)
    }

    fn find_owned(slug: &str, caller_id: i32, connection: &mut SqliteConnection) -> Result<Article, ApiError> {
        let article = Article::find_by_slug(slug, connection)?;
        if article.author_id != caller_id {
            return Err(ApiError::Forbidden);
        }
        Ok(article)
    }

    pub fn update(
        slug: &str,
        caller_id: i32,
        patch: ArticlePatch,
        connection: &mut SqliteConnection,
    ) -> Result<Article, ApiError> {
        let article = Article::find_owned(slug, caller_id, connection)?;
        let changes = ArticleChangeset {
            title: patch.title,
            description: patch.description,
            body: patch.body,
            tag_list: patch.tag_list.map(TagList),
            updated_at: Utc::now().naive_utc(),
        };
        let updated = diesel::update(&article)
            .set(&changes)
            .get_result::<Article>(connection)?;
        Ok(updated)
    }

    /// Removes the article together with every favorite pointing at it.
    pub fn delete(slug: &str, caller_id: i32, connection: &mut SqliteConnection) -> Result<(), ApiError> {
        connection.immediate_transaction(|connection| {
            let article = Article::find_owned(slug, caller_id, connection)?;
            diesel::delete(favorites::table.filter(favorites::article_id.eq(article.id)))
                .execute(connection)?;
            diesel::delete(&article).execute(connection)?;
            log::info!("user {} deleted article {}", caller_id, article.slug);
            Ok(())
        })
    }

    pub fn is_favorited_by(&self, user_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
        let pair = favorites::table.find((user_id, self.id));
        let found = diesel::select(diesel::dsl::exists(pair)).get_result::<bool>(connection)?;
        Ok(found)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub favorited: bool,
    pub favorites_count: i32,
    pub author: Profile<'static>,
}

impl ArticleView {
    pub fn new(article: Article, author: Profile<'static>, favorited: bool) -> Self {
        ArticleView {
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tag_list.0,
            created_at: article.created_at,
            updated_at: article.updated_at,
            favorited,
            favorites_count: article.favorites_count,
            author,
        }
    }

    /// Loads the author and the viewer's favorite flag for a single article.
    pub fn load(
        article: Article,
        viewer: Option<&User>,
        connection: &mut SqliteConnection,
    ) -> Result<Self, ApiError> {
        let author = users::table
            .find(article.author_id)
            .first::<User>(connection)?;
        let favorited = match viewer {
            Some(viewer) => article.is_favorited_by(viewer.id, connection)?,
            None => false,
        };
        Ok(ArticleView::new(article, author.into(), favorited))
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleView,
}
