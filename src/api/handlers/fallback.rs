use crate::api::extractors::RequestCorrelation;
use crate::error::{ApiError, AppError};

/// Routing miss: no table entry and no fixed route matched.
pub async fn not_found(RequestCorrelation(correlation_id): RequestCorrelation) -> ApiError {
    AppError::NotFound.at(Some(&correlation_id))
}
