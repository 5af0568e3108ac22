use crate::utils::try_respond;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json};
use serde::Serialize;
use std::collections::HashMap;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    /// The named entity could not be resolved.
    NotFound(&'static str),
    Forbidden,
    Internal,
    Unauthorized,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        self.0.entry(key.into()).or_default().push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            self.0.entry(key).or_default().extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self, key: &str) -> &[String] {
        self.0.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// `Ok(value)` when nothing was collected, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        match self {
            ApiError::Diesel(error) => match error {
                DieselError::NotFound => {
                    let body = json!({ "errors": { "entity": ["not found"] } });
                    try_respond(req, body, Status::NotFound)
                }
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                    let body = json!({ "errors": { "database": [info.message()] } });
                    try_respond(req, body, Status::UnprocessableEntity)
                }
                other => {
                    log::error!("database failure: {}", other);
                    Err(Status::InternalServerError)
                }
            },

            ApiError::NotFound(entity) => {
                let body = json!({ "errors": { entity: ["not found"] } });
                try_respond(req, body, Status::NotFound)
            }

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                try_respond(req, body, Status::UnprocessableEntity)
            }

            ApiError::Forbidden => {
                let body = json!({ "errors": {
                    "status": ["403 Forbidden"]
                }});
                try_respond(req, body, Status::Forbidden)
            }

            ApiError::Unauthorized => {
                let body = json!({ "errors": {
                    "status": ["401 Unauthorized"]
                }});
                try_respond(req, body, Status::Unauthorized)
            }

            ApiError::Internal => {
                log::error!("internal error while serving {}", req.uri());
                Err(Status::InternalServerError)
            }
        }
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let validated = self.into_inner().validate(connection)?;
        Ok(Json(validated))
    }
}
