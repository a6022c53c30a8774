//! Search, status filtering, date windows and pagination over records that have
//! already been fetched. Nothing here touches the database.

use crate::models::{AuditRecord, ClearanceRequest};
use crate::status::{RequestStatus, StatusFilter};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// A record that list views can search and filter by status.
pub trait Searchable {
    fn status(&self) -> RequestStatus;
    fn search_fields(&self) -> impl Iterator<Item = &str>;
}

impl Searchable for ClearanceRequest {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn search_fields(&self) -> impl Iterator<Item = &str> {
        [
            self.substation.as_str(),
            self.fault_type.as_str(),
            self.id.as_str(),
        ]
        .into_iter()
    }
}

impl Searchable for AuditRecord {
    fn status(&self) -> RequestStatus {
        self.status
    }

    fn search_fields(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.substation.as_str()),
            Some(self.fault_type.as_str()),
            Some(self.id.as_str()),
            self.lineman_id.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Records whose status passes `status` and which contain `query` (case-insensitive)
/// in at least one search field. An empty query matches everything.
pub fn filter_records<'a, T: Searchable>(
    records: &'a [T],
    query: &str,
    status: StatusFilter,
) -> Vec<&'a T> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| status.matches(record.status()))
        .filter(|record| {
            needle.is_empty()
                || record
                    .search_fields()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateWindow {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateWindow {
    pub fn matches(self, ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, ts) {
            (DateWindow::All, _) => true,
            (_, None) => false,
            (DateWindow::Today, Some(ts)) => ts.date_naive() == now.date_naive(),
            (DateWindow::Week, Some(ts)) => ts >= now - TimeDelta::days(7),
            (DateWindow::Month, Some(ts)) => ts >= now - TimeDelta::days(30),
        }
    }
}

impl FromStr for DateWindow {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(DateWindow::All),
            "today" => Ok(DateWindow::Today),
            "week" => Ok(DateWindow::Week),
            "month" => Ok(DateWindow::Month),
            other => Err(PageError::UnknownDateWindow(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("pageSize must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    PageSize(usize),
    #[error("unknown date window {0:?}; expected all, today, week or month")]
    UnknownDateWindow(String),
}

/// Zero-based page index and page size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

const fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Result<Self, PageError> {
        let request = Self { page, page_size };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), PageError> {
        if (1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            Ok(())
        } else {
            Err(PageError::PageSize(self.page_size))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Slice `items` to the requested page. Pages past the end are empty.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let page_size = request.page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let items = items
        .into_iter()
        .skip(request.page.saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        items,
        page: request.page,
        page_size,
        total_items,
        total_pages,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
    pub denied: usize,
    /// Whole percent of requests that are completed.
    pub completion_rate: u32,
    /// Whole percent of requests that were approved (including completed ones).
    pub approval_rate: u32,
}

impl RequestSummary {
    pub fn tally<'a, T: Searchable + 'a>(records: impl IntoIterator<Item = &'a T>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.total += 1;
            match record.status() {
                RequestStatus::Pending => summary.pending += 1,
                RequestStatus::Approved => summary.approved += 1,
                RequestStatus::Completed => summary.completed += 1,
                RequestStatus::Denied => summary.denied += 1,
            }
        }
        summary.completion_rate = whole_percent(summary.completed, summary.total);
        summary.approval_rate = whole_percent(summary.completed + summary.approved, summary.total);
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAnalytics {
    pub total: usize,
    pub completed: usize,
    pub denied: usize,
    /// Percent of resolved requests that were completed, to one decimal place.
    pub completion_rate: f64,
}

impl AuditAnalytics {
    pub fn tally<'a, T: Searchable + 'a>(records: impl IntoIterator<Item = &'a T>) -> Self {
        let mut analytics = Self::default();
        for record in records {
            analytics.total += 1;
            match record.status() {
                RequestStatus::Completed => analytics.completed += 1,
                RequestStatus::Denied => analytics.denied += 1,
                RequestStatus::Pending | RequestStatus::Approved => {}
            }
        }
        if analytics.total > 0 {
            let rate = analytics.completed as f64 / analytics.total as f64 * 100.0;
            analytics.completion_rate = (rate * 10.0).round() / 10.0;
        }
        analytics
    }
}

fn whole_percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}
