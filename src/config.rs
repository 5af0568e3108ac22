use dotenv::dotenv;
use rocket::figment::providers::Env;
use rocket::figment::Figment;
use serde::Deserialize;

/// Settings the service needs on top of Rocket's own configuration.
///
/// Read from `Rocket.toml` / `ROCKET_*` variables, with the plain
/// `DATABASE_URL` and `JWT_SECRET` variables (or a `.env` file) taking
/// precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

fn default_pool_size() -> u32 {
    8
}

fn default_token_ttl_days() -> i64 {
    60
}

pub fn figment() -> Figment {
    dotenv().ok();
    rocket::Config::figment().merge(Env::raw().only(&["database_url", "jwt_secret"]))
}
