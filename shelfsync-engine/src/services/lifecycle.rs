//! Lifecycle classifier
//!
//! Pure function of (registration date, override date, now). No I/O, no hidden
//! state: identical inputs give identical output across restarts.
//!
//! | Stage     | Age (days) |
//! |-----------|------------|
//! | NEW       | [0, 30)    |
//! | CURATED   | [30, 60)   |
//! | ARCHIVE   | [60, 120)  |
//! | CLEARANCE | [120, ∞)   |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::LifecycleStage;
use shelfsync_common::time::{parse_timestamp, whole_days_between};

/// First day of CURATED
pub const CURATED_FROM_DAYS: i64 = 30;
/// First day of ARCHIVE
pub const ARCHIVE_FROM_DAYS: i64 = 60;
/// First day of CLEARANCE
pub const CLEARANCE_FROM_DAYS: i64 = 120;

/// Lifecycle stage plus the age it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleAssessment {
    pub stage: LifecycleStage,
    pub age_days: i64,
    /// Whether the override date (rather than registration) started the clock
    pub from_override: bool,
}

/// Stage for a non-negative age
pub fn stage_for_age(age_days: i64) -> LifecycleStage {
    match age_days {
        a if a >= CLEARANCE_FROM_DAYS => LifecycleStage::Clearance,
        a if a >= ARCHIVE_FROM_DAYS => LifecycleStage::Archive,
        a if a >= CURATED_FROM_DAYS => LifecycleStage::Curated,
        _ => LifecycleStage::New,
    }
}

/// Classify a product's lifecycle
///
/// The override date wins when present and parseable. With no usable start
/// date the product is NEW at age 0 so it is never hidden. Future start dates
/// clamp to age 0.
pub fn classify(
    registered_at: Option<&str>,
    override_date: Option<&str>,
    now: DateTime<Utc>,
) -> LifecycleAssessment {
    let from_override = override_date.and_then(parse_timestamp);
    let (start, from_override) = match from_override {
        Some(start) => (Some(start), true),
        None => (registered_at.and_then(parse_timestamp), false),
    };

    let Some(start) = start else {
        return LifecycleAssessment {
            stage: LifecycleStage::New,
            age_days: 0,
            from_override: false,
        };
    };

    let age_days = whole_days_between(start, now);
    LifecycleAssessment {
        stage: stage_for_age(age_days),
        age_days,
        from_override,
    }
}
