use crate::v1::error::ErrorMessage;
use axum::{
    extract::{FromRequestParts, Query},
    http::{StatusCode, request::Parts},
};
use serde::Deserialize;
use shared::filter::{DEFAULT_PAGE_SIZE, DateWindow, PageRequest};
use shared::status::StatusFilter;

// Raw query string; every field is optional and validated below.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListParams {
    search: Option<String>,
    status: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawWindowParam {
    window: Option<String>,
}

/// Search, status filter and page for list views.
///
/// `?search=gota&status=pending&page=0&pageSize=10`. Missing values fall back to an empty
/// search, `all` and the first page of 10.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub search: String,
    pub status: StatusFilter,
    pub page: PageRequest,
}

/// [`ListParams`] plus the audit log's `window` (`all`, `today`, `week`, `month`).
#[derive(Debug, Clone)]
pub struct AuditParams {
    pub list: ListParams,
    pub window: DateWindow,
}

fn bad_request(e: impl ToString) -> ErrorMessage {
    ErrorMessage::from((StatusCode::BAD_REQUEST, e.to_string()))
}

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = ErrorMessage;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<RawListParams>::from_request_parts(parts, state)
            .await
            .map_err(bad_request)?;

        let status = params
            .status
            .as_deref()
            .unwrap_or_default()
            .parse::<StatusFilter>()
            .map_err(bad_request)?;

        let page = PageRequest::new(
            params.page.unwrap_or(0),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .map_err(bad_request)?;

        Ok(Self {
            search: params.search.unwrap_or_default(),
            status,
            page,
        })
    }
}

impl<S> FromRequestParts<S> for AuditParams
where
    S: Send + Sync,
{
    type Rejection = ErrorMessage;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let list = ListParams::from_request_parts(parts, state).await?;

        let Query(raw) = Query::<RawWindowParam>::from_request_parts(parts, state)
            .await
            .map_err(bad_request)?;
        let window = raw
            .window
            .as_deref()
            .unwrap_or_default()
            .parse::<DateWindow>()
            .map_err(bad_request)?;

        Ok(Self { list, window })
    }
}
