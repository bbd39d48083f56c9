use chrono::{NaiveDate, Utc};

use tillpoint_core::AggregateId;

use crate::app::errors::{ApiError, ApiResult};

/// Parse a path id into its typed wrapper, e.g. `parse_id(&raw, "product", ProductId)`.
pub fn parse_id<T>(raw: &str, what: &'static str, wrap: fn(AggregateId) -> T) -> ApiResult<T> {
    raw.parse::<AggregateId>()
        .map(wrap)
        .map_err(|_| ApiError::new(axum::http::StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

/// Today's date as the reports see it (UTC).
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tillpoint_products::ProductId;

    #[test]
    fn ids_parse_or_fail_as_bad_request() {
        let id = AggregateId::new();
        assert_eq!(parse_id(&id.to_string(), "product", ProductId).unwrap(), ProductId(id));

        let err = parse_id("not-a-uuid", "product", ProductId).unwrap_err();
        assert_eq!(err.code, "invalid_id");
        assert_eq!(err.message, "invalid product id");
    }
}
