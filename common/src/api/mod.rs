mod params;

use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    error::{EngineError, ErrorKind},
};

pub use params::*;

/// Typed failure carried by an [`ApiResponse`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&EngineError> for ApiError {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Envelope returned by every exposed operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(err: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.into()),
        }
    }

}

impl<T> From<Result<T, EngineError>> for ApiResponse<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}

/// One page of a newest-first or insertion-ordered listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of items matching the query, across every page.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, offset: usize, limit: usize) -> Self {
        Self {
            items,
            total,
            offset,
            limit,
        }
    }
}

/// Clamp requested paging to `MAX_PAGE_SIZE`, defaulting to `DEFAULT_PAGE_SIZE`.
pub fn page_bounds(offset: Option<usize>, limit: Option<usize>) -> (usize, usize) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (offset.unwrap_or(0), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope() -> Result<(), Box<dyn std::error::Error>> {
        let response: ApiResponse<u64> = Err(EngineError::ZeroAmount).into();
        assert!(!response.success);

        let value = serde_json::to_value(&response)?;
        assert_eq!(value["success"], false);
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], 100);
        assert_eq!(value["error"]["kind"], "validation");
        assert_eq!(value["error"]["retryable"], false);
        Ok(())
    }

    #[test]
    fn test_success_envelope() -> Result<(), Box<dyn std::error::Error>> {
        let response = ApiResponse::ok(42u64);
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 42);
        assert!(value.get("error").is_none());
        assert_eq!(response.data, Some(42));
        Ok(())
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (0, DEFAULT_PAGE_SIZE));
        assert_eq!(page_bounds(Some(5), Some(10_000)), (5, MAX_PAGE_SIZE));
        assert_eq!(page_bounds(None, Some(0)), (0, 1));
    }
}
