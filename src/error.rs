use axum::{
    response::{IntoResponse, Response},
    Json,
};
use hyper::StatusCode;
use serde_json::json;

use crate::rental::availability::{BookingError, DateRange};

/// Every failure is terminal for the request that caused it; the client
/// retries manually. No retry queue, no partial success.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("requested dates are unavailable")]
    DatesUnavailable(Vec<DateRange>),
    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DatesUnavailable(_) => StatusCode::CONFLICT,
            ApiError::Db(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Db(e) => log::error!("database error: {}", e),
            ApiError::Internal(e) => log::error!("internal error: {}", e),
            _ => {}
        }
        let body = match &self {
            ApiError::DatesUnavailable(conflicts) => json!({
                "error": self.to_string(),
                "conflicts": conflicts,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn status_codes_follow_the_error_class() {
        assert_eq!(
            ApiError::Validation("missing dates".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("car").status(), StatusCode::NOT_FOUND);

        let busy = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            NaiveDate::from_ymd_opt(2025, 11, 25).unwrap(),
        )
        .unwrap();
        assert_eq!(
            ApiError::DatesUnavailable(vec![busy]).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn booking_errors_convert_to_validation() {
        let err: ApiError = BookingError::EndBeforeStart.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
