use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::{Value, json};
use validator::ValidationErrors;

use crate::model::attendance::ClockConflict;

/// Shown for any failed login, whichever part of the credentials was wrong.
pub const LOGIN_FAILED_MESSAGE: &str = "Login information is not registered";

/// Per-field form errors, keyed by field name (`clock_out`, `breaks.0`, ...).
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{field} is invalid"));
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        FieldErrors::from(&errors)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("the given data was invalid")]
    Validation { errors: FieldErrors, old: Value },
    #[error("Login information is not registered")]
    Authentication { old: Value },
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(errors: impl Into<FieldErrors>) -> Self {
        Self::Validation {
            errors: errors.into(),
            old: Value::Null,
        }
    }

    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::invalid(errors)
    }

    /// Attaches the submitted input so the form can be refilled.
    pub fn with_old(self, input: Value) -> Self {
        match self {
            Self::Validation { errors, .. } => Self::Validation { errors, old: input },
            Self::Authentication { .. } => Self::Authentication { old: input },
            other => other,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::Authentication { .. } => "AUTHENTICATION",
            Self::Conflict(_) => "CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Database(_) | Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<ClockConflict> for AppError {
    fn from(conflict: ClockConflict) -> Self {
        Self::Conflict(conflict.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Authentication { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::Database(e) => tracing::error!(error = %e, kind = "DATABASE", "database error"),
            Self::Internal(e) => tracing::error!(error = %e, kind = "INTERNAL", "internal error"),
            _ => {}
        }

        let mut body = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });

        match self {
            Self::Validation { errors, old } => {
                body["errors"] = json!(errors);
                if !old.is_null() {
                    body["old"] = old.clone();
                }
            }
            Self::Authentication { old } => {
                body["errors"] = json!({ "email": [LOGIN_FAILED_MESSAGE] });
                if !old.is_null() {
                    body["old"] = old.clone();
                }
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn render(error: AppError) -> (StatusCode, Value) {
        let resp = error.error_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn validation_error_lists_fields_and_echoes_input() {
        let mut errors = FieldErrors::new();
        errors.add("clock_out", "Clock-in or clock-out time is invalid");
        let error = AppError::invalid(errors).with_old(json!({ "clock_out": "08:00" }));

        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "VALIDATION");
        assert_eq!(
            body["errors"]["clock_out"][0],
            "Clock-in or clock-out time is invalid"
        );
        assert_eq!(body["old"]["clock_out"], "08:00");
    }

    #[actix_web::test]
    async fn authentication_error_reports_on_email_without_password() {
        let error = AppError::Authentication {
            old: json!({ "email": "taro@example.com" }),
        };

        let (status, body) = render(error).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"]["email"][0], LOGIN_FAILED_MESSAGE);
        assert_eq!(body["old"]["email"], "taro@example.com");
        assert!(body["old"].get("password").is_none());
    }

    #[actix_web::test]
    async fn clock_conflict_maps_to_409() {
        let (status, body) = render(ClockConflict::AlreadyClockedIn.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "CONFLICT");
        assert_eq!(body["message"], "already clocked in today");
    }

    #[actix_web::test]
    async fn not_found_and_invalid_state_statuses() {
        let (status, body) = render(AppError::NotFound("correction request")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "correction request not found");

        let (status, body) =
            render(AppError::InvalidState("request already approved".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "INVALID_STATE");
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(AppError::Internal(anyhow::anyhow!("smtp exploded"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal error");
    }

    #[test]
    fn field_errors_merge_keeps_both_sides() {
        let mut a = FieldErrors::new();
        a.add("clock_in", "bad");
        let mut b = FieldErrors::new();
        b.add("clock_in", "worse");
        b.add("remark", "missing");
        a.merge(b);
        assert_eq!(a.get("clock_in").unwrap().len(), 2);
        assert!(a.contains("remark"));
    }
}
