use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::status::RecordStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(anyhow::anyhow!("Invalid sort direction: {}", s)),
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Whitelisted sort columns for record listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSortField {
    #[default]
    CreatedAt,
    WorkerId,
    EmployeeName,
    Amount,
    Status,
}

impl RecordSortField {
    pub fn column(self) -> &'static str {
        match self {
            RecordSortField::CreatedAt => "created_at",
            RecordSortField::WorkerId => "worker_id",
            RecordSortField::EmployeeName => "employee_name",
            RecordSortField::Amount => "amount",
            RecordSortField::Status => "status_id",
        }
    }

    /// Unknown keys fall back to `createdAt`.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim() {
            "workerId" | "worker_id" => RecordSortField::WorkerId,
            "employeeName" | "employee_name" => RecordSortField::EmployeeName,
            "amount" => RecordSortField::Amount,
            "status" | "statusId" | "status_id" => RecordSortField::Status,
            _ => RecordSortField::CreatedAt,
        }
    }
}

/// Sort keys for file summaries. Other keys keep repository order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileSortField {
    UploadDate,
    TotalRecords,
}

impl FileSortField {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "uploadDate" | "upload_date" => Some(FileSortField::UploadDate),
            "totalRecords" | "total_records" => Some(FileSortField::TotalRecords),
            _ => None,
        }
    }
}

/// Inclusive calendar-day range; the end day runs to 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Both ends are required for a range to apply.
    pub fn from_parts(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Some(Self { start, end }),
            _ => None,
        }
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&self.end.and_time(end_of_day))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start_instant() && instant <= self.end_instant()
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PageRequest {
    #[validate(range(max = 1_000_000))]
    pub page: u32,
    #[validate(range(min = 1, max = 500))]
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_elements: u64, request: PageRequest) -> Self {
        let size = u64::from(request.size.max(1));
        let total_pages = total_elements.div_ceil(size);
        Self {
            data,
            total_elements,
            total_pages,
            current_page: request.page,
            page_size: request.size,
            has_next: u64::from(request.page) + 1 < total_pages,
            has_previous: request.page > 0,
        }
    }

    /// Slice an already-filtered, already-sorted list.
    pub fn from_full(mut items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let start = (request.offset() as usize).min(items.len());
        let end = (start + request.size as usize).min(items.len());
        let data: Vec<T> = items.drain(start..end).collect();
        Self::new(data, total, request)
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Filters for a paginated record listing within one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub file_id: Uuid,
    pub status: Option<RecordStatus>,
    pub created: Option<DateRange>,
    pub sort_by: RecordSortField,
    pub sort_dir: SortDirection,
    pub page: PageRequest,
}

/// Filters for the paginated file summary listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSummaryQuery {
    pub file_id: Option<Uuid>,
    pub status: Option<RecordStatus>,
    pub uploaded: Option<DateRange>,
    pub sort_by: Option<FileSortField>,
    pub sort_dir: SortDirection,
    pub page: PageRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_metadata() {
        let page: Page<u32> = Page::new(vec![1, 2], 5, PageRequest::new(0, 2));
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);

        let last: Page<u32> = Page::new(vec![5], 5, PageRequest::new(2, 2));
        assert!(!last.has_next);
        assert!(last.has_previous);

        let empty: Page<u32> = Page::new(vec![], 0, PageRequest::new(0, 10));
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_from_full_slices() {
        let page = Page::from_full((0..7).collect::<Vec<u32>>(), PageRequest::new(1, 3));
        assert_eq!(page.data, vec![3, 4, 5]);
        assert_eq!(page.total_elements, 7);

        let beyond = Page::from_full((0..7).collect::<Vec<u32>>(), PageRequest::new(9, 3));
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_elements, 7);
    }

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(0, 20).validate().is_ok());
        assert!(PageRequest::new(0, 0).validate().is_err());
        assert!(PageRequest::new(0, 501).validate().is_err());
    }

    #[test]
    fn test_record_sort_whitelist() {
        assert_eq!(
            RecordSortField::parse_or_default("employeeName"),
            RecordSortField::EmployeeName
        );
        assert_eq!(
            RecordSortField::parse_or_default("1; DROP TABLE"),
            RecordSortField::CreatedAt
        );
        assert_eq!(RecordSortField::Status.column(), "status_id");
    }

    #[test]
    fn test_date_range_inclusive_end_of_day() {
        let range = DateRange::from_parts(
            NaiveDate::from_ymd_opt(2024, 1, 1),
            NaiveDate::from_ymd_opt(2024, 1, 31),
        )
        .unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(range.contains(late));
        assert!(!range.contains(next));
        assert!(DateRange::from_parts(NaiveDate::from_ymd_opt(2024, 1, 1), None).is_none());
    }
}
