use chrono::{NaiveDateTime, SecondsFormat};
use rand::Rng;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{Json, Value};
use serde::Serializer;

pub fn try_respond<'r, 'o: 'r>(
    req: &'r Request<'_>,
    json: Value,
    status: Status,
) -> response::Result<'o> {
    (status, Json(json)).respond_to(req)
}

/// Timestamps are stored as naive UTC and rendered as `2018-06-01T10:00:00.000Z`.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// A random base-36 string of one to six characters.
pub fn random_suffix() -> String {
    let value = rand::thread_rng().gen_range(0..36u32.pow(6));
    to_base36(value)
}
