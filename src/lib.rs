#[macro_use]
extern crate rocket;
#[macro_use]
extern crate error_chain;

pub mod article;
pub mod config;
pub mod db;
pub mod profile;
pub mod types;
pub mod users;
pub mod utils;

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Rocket};

use crate::config::AppConfig;

#[catch(400)]
fn bad_request() -> Value {
    json!({ "errors": { "body": ["invalid request"] } })
}

#[catch(401)]
fn unauthorized() -> Value {
    json!({ "errors": { "status": ["401 Unauthorized"] } })
}

#[catch(404)]
fn not_found(req: &Request) -> Value {
    json!({ "errors": { "path": [format!("{} not found", req.uri())] } })
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Value {
    json!({ "errors": { "body": ["malformed request body"] } })
}

#[catch(500)]
fn internal_error() -> Value {
    json!({ "errors": { "status": ["500 Internal Server Error"] } })
}

/// Builds the service from the default configuration sources.
pub fn rocket() -> db::Result<Rocket<Build>> {
    build(config::figment())
}

/// Builds the service from `figment`: opens the pool, creates the schema
/// and mounts every route.
pub fn build(figment: Figment) -> db::Result<Rocket<Build>> {
    let config: AppConfig = figment.extract().map_err(|e| e.to_string())?;
    let pool = db::init_pool(&config)?;
    let mut connection = pool.get()?;
    db::run_migrations(&mut connection)?;
    drop(connection);
    let database_url = config.database_url.clone();

    Ok(rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .attach(AdHoc::on_liftoff("Database", move |_| {
            let database_url = database_url.clone();
            Box::pin(async move {
                log::info!("serving articles from {}", database_url);
            })
        }))
        .mount(
            "/api",
            routes![
                users::register,
                users::login,
                users::current,
                users::update,
                profile::profile,
                article::list,
                article::get,
                article::create,
                article::update,
                article::delete,
                article::favorite,
                article::unfavorite,
            ],
        )
        .register(
            "/",
            catchers![bad_request, unauthorized, not_found, unprocessable, internal_error],
        ))
}
