//! Filter model for incoming log queries.
//!
//! The dashboard sends filters as loose query-string parameters. This module
//! normalizes them into an immutable [`FilterSet`]: empty string means "no
//! filter", pagination is parsed leniently and clamped, and malformed values
//! degrade to defaults instead of failing. The model is permissive by design;
//! the store never sees anything the query builder has not bound as a
//! parameter.

use serde::Deserialize;

/// Default page size when the request does not specify one.
pub const DEFAULT_LIMIT: u32 = 50;

/// Hard ceiling on the page size to bound result transfer volume.
pub const MAX_LIMIT: u32 = 200;

/// Raw query-string parameters as received from the router.
///
/// Everything is a string and everything is optional. Unknown parameters are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFilterParams {
    pub search: String,
    pub severity: String,
    pub hostname: String,
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub from: String,
    pub to: String,
    pub page: String,
    pub limit: String,
}

/// Normalized, validated filter set for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    /// Substring match against the message field.
    pub search: String,
    pub severity: String,
    pub hostname: String,
    pub source_name: String,
    pub event_type: String,
    /// Inclusive lower bound on event time.
    pub from: String,
    /// Inclusive upper bound on event time.
    pub to: String,
    /// 1-based page number, always >= 1.
    pub page: u32,
    /// Page size, already clamped to [`MAX_LIMIT`].
    pub limit: u32,
}

impl FilterSet {
    /// Normalizes raw parameters into a filter set.
    ///
    /// Unparseable `page` or `limit` values fall back to their defaults; a
    /// `limit` above [`MAX_LIMIT`] is clamped.
    pub fn parse(raw: &RawFilterParams) -> Self {
        let page = raw
            .page
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = raw
            .limit
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);

        Self {
            search: raw.search.clone(),
            severity: raw.severity.clone(),
            hostname: raw.hostname.clone(),
            source_name: raw.source_name.clone(),
            event_type: raw.event_type.clone(),
            from: raw.from.clone(),
            to: raw.to.clone(),
            page,
            limit,
        }
    }

    /// Row offset for the current page.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }

    /// Canonical, field-order-stable token used for cache key derivation.
    ///
    /// Two requests carrying the same filters always produce the same token,
    /// regardless of the order the HTTP parameters arrived in. Pagination is
    /// appended only when the caller asks for it (row-listing keys include it,
    /// count keys do not).
    pub fn canonical(&self, with_pagination: bool) -> String {
        let mut token = format!(
            "search={}|severity={}|hostname={}|sourceName={}|eventType={}|from={}|to={}",
            self.search,
            self.severity,
            self.hostname,
            self.source_name,
            self.event_type,
            self.from,
            self.to,
        );
        if with_pagination {
            token.push_str(&format!("|page={}|limit={}", self.page, self.limit));
        }
        token
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::parse(&RawFilterParams::default())
    }
}
