//! Range-filtered inventory queries
//!
//! Callers describe an image listing as a set of named range filters plus an
//! ordering and a limit:
//!
//! ```json
//! {
//!   "imageAddedRange": { "min": "2024-01-01T00:00:00Z" },
//!   "viewcountRange": { "min": 5 },
//!   "orderBy": "viewcount",
//!   "order": "desc",
//!   "limit": 100
//! }
//! ```
//!
//! [`RangeQueryParams::build`] validates that description into an
//! [`ImageQueryPlan`]. Filters are looked up by name in [`RangeField`] and
//! combined uniformly (logical AND); the storage layer renders each one the
//! same way from its column and bounds. Adding a filter means adding a
//! [`RangeField`] variant, nothing else.
//!
//! Ordering columns come from the fixed [`OrderBy`] allow-list and never
//! from caller text.
//!
//! A temporal filter without a minimum starts at 1 January 4713 BC, the
//! start of PostgreSQL's timestamp range, so no stored date falls below it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::db::store::ImageSummary;

/// Upper sentinel for count filters given without a maximum.
pub const COUNT_UNBOUNDED: i64 = i64::MAX;

/// Lower sentinel for temporal filters given without a minimum.
pub fn earliest_instant() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(-4712, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryBuildError {
    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Invalid bound for '{filter}': {reason}")]
    InvalidBound { filter: &'static str, reason: String },

    #[error("Range '{0}' has a minimum greater than its maximum")]
    InvertedRange(&'static str),

    #[error("Cannot order by '{0}'")]
    UnknownOrderBy(String),

    #[error("Order must be 'asc' or 'desc', got '{0}'")]
    UnknownOrder(String),

    #[error("Limit must be a positive integer, got {0}")]
    InvalidLimit(i64),
}

// ============================================================================
// Filters
// ============================================================================

/// How a filter's bounds are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Temporal,
    Count,
}

/// Every filterable quantity of the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeField {
    ImageAdded,
    LastViewed,
    Viewcount,
    NumAnnotations,
    NumPredictions,
}

impl RangeField {
    pub const ALL: [RangeField; 5] = [
        RangeField::ImageAdded,
        RangeField::LastViewed,
        RangeField::Viewcount,
        RangeField::NumAnnotations,
        RangeField::NumPredictions,
    ];

    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.param_name() == name)
    }

    /// Request key naming this filter.
    pub fn param_name(self) -> &'static str {
        match self {
            RangeField::ImageAdded => "imageAddedRange",
            RangeField::LastViewed => "lastViewedRange",
            RangeField::Viewcount => "viewcountRange",
            RangeField::NumAnnotations => "numAnnoRange",
            RangeField::NumPredictions => "numPredRange",
        }
    }

    /// Column of the inventory relation the filter applies to.
    pub fn column(self) -> &'static str {
        match self {
            RangeField::ImageAdded => "date_added",
            RangeField::LastViewed => "last_viewed",
            RangeField::Viewcount => "viewcount",
            RangeField::NumAnnotations => "num_anno",
            RangeField::NumPredictions => "num_pred",
        }
    }

    pub fn kind(self) -> RangeKind {
        match self {
            RangeField::ImageAdded | RangeField::LastViewed => RangeKind::Temporal,
            RangeField::Viewcount | RangeField::NumAnnotations | RangeField::NumPredictions => {
                RangeKind::Count
            },
        }
    }

    fn value_of(self, image: &ImageSummary) -> Option<BoundValue> {
        match self {
            RangeField::ImageAdded => Some(BoundValue::Instant(image.date_added)),
            RangeField::LastViewed => image.last_viewed.map(BoundValue::Instant),
            RangeField::Viewcount => Some(BoundValue::Count(image.viewcount)),
            RangeField::NumAnnotations => Some(BoundValue::Count(image.num_annotations)),
            RangeField::NumPredictions => Some(BoundValue::Count(image.num_predictions)),
        }
    }
}

/// A validated bound.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum BoundValue {
    Instant(DateTime<Utc>),
    Count(i64),
}

/// A bound as supplied by the caller: epoch seconds, an RFC 3339 string, or
/// a plain count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBound {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// A caller-supplied `{min, max}` pair; either side may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<RawBound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<RawBound>,
}

/// One validated filter: `min <= field <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    pub field: RangeField,
    pub min: BoundValue,
    pub max: BoundValue,
}

impl RangeFilter {
    fn resolve(
        field: RangeField,
        raw: &RawRange,
        now: DateTime<Utc>,
    ) -> Result<Self, QueryBuildError> {
        let (default_min, default_max) = match field.kind() {
            RangeKind::Temporal => (
                BoundValue::Instant(earliest_instant()),
                BoundValue::Instant(now),
            ),
            RangeKind::Count => (BoundValue::Count(0), BoundValue::Count(COUNT_UNBOUNDED)),
        };

        let min = match &raw.min {
            Some(bound) => parse_bound(field, bound)?,
            None => default_min,
        };
        let max = match &raw.max {
            Some(bound) => parse_bound(field, bound)?,
            None => default_max,
        };

        if min > max {
            return Err(QueryBuildError::InvertedRange(field.param_name()));
        }

        Ok(Self { field, min, max })
    }

    /// Whether `image` satisfies this filter. A missing value (an image that
    /// was never viewed) never satisfies a filter on that value.
    pub fn matches(&self, image: &ImageSummary) -> bool {
        self.field
            .value_of(image)
            .map(|value| self.min <= value && value <= self.max)
            .unwrap_or(false)
    }
}

fn parse_bound(field: RangeField, raw: &RawBound) -> Result<BoundValue, QueryBuildError> {
    let invalid = |reason: &str| QueryBuildError::InvalidBound {
        filter: field.param_name(),
        reason: reason.to_string(),
    };

    match (field.kind(), raw) {
        (RangeKind::Temporal, RawBound::Integer(secs)) => DateTime::from_timestamp(*secs, 0)
            .map(BoundValue::Instant)
            .ok_or_else(|| invalid("timestamp out of range")),
        (RangeKind::Temporal, RawBound::Float(secs)) => {
            if !secs.is_finite() {
                return Err(invalid("timestamp must be finite"));
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
                return Err(invalid("timestamp out of range"));
            }
            DateTime::from_timestamp(whole as i64, nanos)
                .map(BoundValue::Instant)
                .ok_or_else(|| invalid("timestamp out of range"))
        },
        (RangeKind::Temporal, RawBound::Text(text)) => DateTime::parse_from_rfc3339(text)
            .map(|dt| BoundValue::Instant(dt.with_timezone(&Utc)))
            .map_err(|e| invalid(&e.to_string())),
        (RangeKind::Count, RawBound::Integer(n)) if *n >= 0 => Ok(BoundValue::Count(*n)),
        (RangeKind::Count, RawBound::Integer(_)) => Err(invalid("counts cannot be negative")),
        (RangeKind::Count, RawBound::Float(n)) => {
            if !n.is_finite() || n.fract() != 0.0 {
                return Err(invalid("counts must be whole numbers"));
            }
            if *n < 0.0 {
                return Err(invalid("counts cannot be negative"));
            }
            if *n >= i64::MAX as f64 {
                Ok(BoundValue::Count(COUNT_UNBOUNDED))
            } else {
                Ok(BoundValue::Count(*n as i64))
            }
        },
        (RangeKind::Count, RawBound::Text(_)) => Err(invalid("counts must be numbers")),
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Sortable inventory columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    Filename,
    #[default]
    DateAdded,
    LastViewed,
    Viewcount,
    NumAnnotations,
    NumPredictions,
}

impl OrderBy {
    /// Accepts the column names and their camelCase spellings; anything else
    /// is refused.
    pub fn from_param(name: &str) -> Option<Self> {
        match name.trim() {
            "filename" => Some(OrderBy::Filename),
            "date_added" | "dateAdded" => Some(OrderBy::DateAdded),
            "last_viewed" | "lastViewed" => Some(OrderBy::LastViewed),
            "viewcount" => Some(OrderBy::Viewcount),
            "num_anno" | "numAnnotations" => Some(OrderBy::NumAnnotations),
            "num_pred" | "numPredictions" => Some(OrderBy::NumPredictions),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            OrderBy::Filename => "filename",
            OrderBy::DateAdded => "date_added",
            OrderBy::LastViewed => "last_viewed",
            OrderBy::Viewcount => "viewcount",
            OrderBy::NumAnnotations => "num_anno",
            OrderBy::NumPredictions => "num_pred",
        }
    }

    /// Compare two images on this column; missing values sort last in both
    /// directions, matching `NULLS LAST`.
    fn compare(self, a: &ImageSummary, b: &ImageSummary, order: SortOrder) -> Ordering {
        let directed = |ordering: Ordering| match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        };

        match self {
            OrderBy::Filename => directed(a.filename.cmp(&b.filename)),
            OrderBy::DateAdded => directed(a.date_added.cmp(&b.date_added)),
            OrderBy::LastViewed => match (a.last_viewed, b.last_viewed) {
                (Some(x), Some(y)) => directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            OrderBy::Viewcount => directed(a.viewcount.cmp(&b.viewcount)),
            OrderBy::NumAnnotations => directed(a.num_annotations.cmp(&b.num_annotations)),
            OrderBy::NumPredictions => directed(a.num_predictions.cmp(&b.num_predictions)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(SortOrder::Ascending),
            "desc" | "descending" => Some(SortOrder::Descending),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Server-side bounds on result size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// Applied when the caller gives no limit.
    pub default_limit: i64,
    /// Hard ceiling; larger requested limits are clamped to it.
    pub max_limit: i64,
}

/// Caller input for an inventory listing, as received on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// Every other key is a named range filter.
    #[serde(flatten)]
    pub ranges: BTreeMap<String, RawRange>,
}

impl RangeQueryParams {
    /// Validate into a plan. `now` is the default upper bound of temporal
    /// filters.
    pub fn build(
        &self,
        limits: &QueryLimits,
        now: DateTime<Utc>,
    ) -> Result<ImageQueryPlan, QueryBuildError> {
        let filters = self
            .ranges
            .iter()
            .map(|(name, raw)| {
                let field = RangeField::from_param(name)
                    .ok_or_else(|| QueryBuildError::UnknownFilter(name.clone()))?;
                RangeFilter::resolve(field, raw, now)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let order_by = match self.order_by.as_deref() {
            Some(name) => OrderBy::from_param(name)
                .ok_or_else(|| QueryBuildError::UnknownOrderBy(name.to_string()))?,
            None => OrderBy::default(),
        };

        let order = match self.order.as_deref() {
            Some(value) => SortOrder::from_param(value)
                .ok_or_else(|| QueryBuildError::UnknownOrder(value.to_string()))?,
            None => SortOrder::default(),
        };

        let limit = match self.limit {
            Some(limit) if limit < 1 => return Err(QueryBuildError::InvalidLimit(limit)),
            Some(limit) => limit.min(limits.max_limit),
            None => limits.default_limit,
        };

        Ok(ImageQueryPlan {
            filters,
            order_by,
            order,
            limit,
        })
    }
}

/// A validated, bounded inventory query.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQueryPlan {
    pub filters: Vec<RangeFilter>,
    pub order_by: OrderBy,
    pub order: SortOrder,
    pub limit: i64,
}

impl ImageQueryPlan {
    pub fn matches(&self, image: &ImageSummary) -> bool {
        self.filters.iter().all(|filter| filter.matches(image))
    }

    /// Total order used for results: the requested column, then id.
    pub fn compare(&self, a: &ImageSummary, b: &ImageSummary) -> Ordering {
        self.order_by
            .compare(a, b, self.order)
            .then_with(|| a.id.cmp(&b.id))
    }
}
