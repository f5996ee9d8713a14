//! Movement query interface for audit and reconciliation.
//!
//! These reads are off the record hot path. All queries are product-scoped
//! and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_stock::{MovementDirection, StockMovement};

/// Pagination parameters for movement queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of movements to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for movement queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    /// Filter by direction (optional).
    pub direction: Option<MovementDirection>,
    /// Movements committed at or after this time (optional).
    pub created_after: Option<DateTime<Utc>>,
    /// Movements committed at or before this time (optional).
    pub created_before: Option<DateTime<Utc>>,
}

impl MovementFilter {
    /// Whether a committed movement falls inside this filter.
    pub fn matches(&self, movement: &StockMovement) -> bool {
        if let Some(direction) = self.direction {
            if movement.direction != direction {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if movement.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if movement.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Paginated movement query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementPage {
    /// The movements matching the query, `created_at` ascending.
    pub movements: Vec<StockMovement>,
    /// Total number of movements matching the filter (across all pages).
    pub total: u64,
    /// Pagination parameters used.
    pub pagination: Pagination,
    /// Whether there are more movements available.
    pub has_more: bool,
}
