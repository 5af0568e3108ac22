use super::models::User;
use crate::types::{ApiError, ValidationError};
use diesel::sqlite::SqliteConnection;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.trim().len() < 3 {
        Err(ValidationError::from(
            "username",
            format!("username too short: {}", username),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < 5 {
        Err(ValidationError::from("password", "Password too short"))
    } else {
        Ok(())
    }
}

/// Format check plus uniqueness. `except` is the id of the user allowed to
/// already own the address, when updating.
pub fn validate_email(
    email_to_validate: &str,
    except: Option<i32>,
    connection: &mut SqliteConnection,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_email_re(email_to_validate) {
        errors.merge(e);
    }

    if let Some(owner) = User::load_by_email(email_to_validate, connection)? {
        if Some(owner.id) != except {
            errors.add_error("email", "Email already exists");
        }
    }
    errors.into_result(()).map_err(|e| e.into())
}

pub fn validate_username(
    username_to_validate: &str,
    except: Option<i32>,
    connection: &mut SqliteConnection,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username_to_validate) {
        errors.merge(e);
    }

    if let Some(owner) = User::load_by_name(username_to_validate, connection)? {
        if Some(owner.id) != except {
            errors.add_error("username", "Username already exists");
        }
    }
    errors.into_result(()).map_err(|e| e.into())
}
