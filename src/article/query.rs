//! Filtered, paginated article listings.
//!
//! Criteria are first resolved into plain predicates (user names become ids).
//! A name that does not resolve, or a favorites set that is empty,
//! short-circuits into an empty listing. Empty strings and a zero limit count
//! as absent. The same predicates then drive both the page query and the count
//! query, so `articles_count` ignores the page window but honours every filter.

use super::models::{Article, ArticleView};
use crate::db::schema::{articles, favorites, users};
use crate::types::ApiError;
use crate::users::models::User;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteConnection};
use rocket::FromForm;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

diesel::define_sql_function! {
    /// 1-based position of `needle` in `haystack`, 0 when absent. Unlike
    /// `LIKE` this is case-sensitive and has no wildcards.
    fn instr(haystack: Text, needle: Text) -> Integer;
}

#[derive(Debug, Default, Clone, FromForm)]
pub struct ArticleFilter {
    /// Substring looked up in the serialized tag list.
    pub tag: Option<String>,
    /// Exact username of the author.
    pub author: Option<String>,
    /// Username whose favorites the listing is limited to.
    pub favorited: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub articles: Vec<ArticleView>,
    pub articles_count: i64,
}

impl ArticleList {
    fn empty() -> Self {
        ArticleList {
            articles: Vec::new(),
            articles_count: 0,
        }
    }
}

impl ArticleFilter {
    fn given(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|s| !s.is_empty())
    }

    fn page_limit(&self) -> Option<i64> {
        self.limit.filter(|&limit| limit > 0).map(i64::from)
    }
}

#[derive(Debug, Default)]
struct Predicates<'a> {
    tag: Option<&'a str>,
    author_id: Option<i32>,
    favorited_by: Option<i32>,
}

impl<'a> Predicates<'a> {
    /// `None` when the criteria can not match anything.
    fn resolve(filter: &'a ArticleFilter, connection: &mut SqliteConnection) -> Result<Option<Self>, ApiError> {
        let mut predicates = Predicates {
            tag: ArticleFilter::given(&filter.tag),
            ..Predicates::default()
        };

        if let Some(name) = ArticleFilter::given(&filter.author) {
            match User::load_by_name(name, connection)? {
                Some(author) => predicates.author_id = Some(author.id),
                None => return Ok(None),
            }
        }

        if let Some(name) = ArticleFilter::given(&filter.favorited) {
            let fan = match User::load_by_name(name, connection)? {
                Some(fan) => fan,
                None => return Ok(None),
            };
            let liked_any = favorites::table.filter(favorites::user_id.eq(fan.id));
            let has_favorites = diesel::select(exists(liked_any)).get_result::<bool>(connection)?;
            if !has_favorites {
                return Ok(None);
            }
            predicates.favorited_by = Some(fan.id);
        }

        Ok(Some(predicates))
    }

    fn query(&self) -> articles::BoxedQuery<'_, Sqlite> {
        let mut query = articles::table.into_boxed();
        if let Some(tag) = self.tag {
            query = query.filter(instr(articles::tag_list, tag).gt(0));
        }
        if let Some(author_id) = self.author_id {
            query = query.filter(articles::author_id.eq(author_id));
        }
        if let Some(fan_id) = self.favorited_by {
            let liked = favorites::table
                .filter(favorites::user_id.eq(fan_id))
                .select(favorites::article_id);
            query = query.filter(articles::id.eq_any(liked));
        }
        query
    }
}

/// Lists articles matching `filter` in creation order, flagging the ones
/// `viewer` has favorited.
pub fn list_articles(
    filter: &ArticleFilter,
    viewer: Option<&User>,
    connection: &mut SqliteConnection,
) -> Result<ArticleList, ApiError> {
    let predicates = match Predicates::resolve(filter, connection)? {
        Some(predicates) => predicates,
        None => return Ok(ArticleList::empty()),
    };

    let articles_count = predicates.query().count().get_result::<i64>(connection)?;

    let mut page = predicates
        .query()
        .order((articles::created_at.asc(), articles::id.asc()));
    if let Some(limit) = filter.page_limit() {
        page = page.limit(limit);
    }
    if let Some(offset) = filter.offset {
        page = page.offset(i64::from(offset));
    }
    let found = page.load::<Article>(connection)?;

    let author_ids = found.iter().map(|a| a.author_id).collect::<HashSet<_>>();
    let authors = users::table
        .filter(users::id.eq_any(author_ids))
        .load::<User>(connection)?
        .into_iter()
        .map(|user| (user.id, user))
        .collect::<HashMap<_, _>>();

    let favorited = match viewer {
        Some(viewer) => favorites::table
            .filter(favorites::user_id.eq(viewer.id))
            .filter(favorites::article_id.eq_any(found.iter().map(|a| a.id)))
            .select(favorites::article_id)
            .load::<i32>(connection)?
            .into_iter()
            .collect::<HashSet<_>>(),
        None => HashSet::new(),
    };

    let views = found
        .into_iter()
        .map(|article| {
            let author = authors.get(&article.author_id).cloned().ok_or(ApiError::Internal)?;
            let is_favorited = favorited.contains(&article.id);
            Ok(ArticleView::new(article, author.into(), is_favorited))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(ArticleList {
        articles: views,
        articles_count,
    })
}
