//! Override side table model
//!
//! Overrides are keyed by product id and hold corrections that take precedence
//! over catalog-derived defaults. Writes distinguish three intents per field,
//! see [`FieldUpdate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use shelfsync_common::models::{CategorySource, ConditionGrade, DisplayCategory};

/// Per-field write intent
///
/// In JSON an absent key is `Unchanged` and an explicit `null` is `Clear`;
/// pair every field with `#[serde(default)]` to get that behavior.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as it is
    #[default]
    Unchanged,
    /// Store NULL
    Clear,
    /// Store a value
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, FieldUpdate::Unchanged)
    }

    /// `None` when unchanged, `Some(None)` when cleared, `Some(Some(v))` when set
    pub fn as_write(&self) -> Option<Option<&T>> {
        match self {
            FieldUpdate::Unchanged => None,
            FieldUpdate::Clear => Some(None),
            FieldUpdate::Set(value) => Some(Some(value)),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FieldUpdate<U> {
        match self {
            FieldUpdate::Unchanged => FieldUpdate::Unchanged,
            FieldUpdate::Clear => FieldUpdate::Clear,
            FieldUpdate::Set(value) => FieldUpdate::Set(f(value)),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => FieldUpdate::Set(value),
            None => FieldUpdate::Clear,
        })
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Set(value) => value.serialize(serializer),
            FieldUpdate::Unchanged | FieldUpdate::Clear => serializer.serialize_none(),
        }
    }
}

/// Internal-category pin together with its author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPin {
    pub category: DisplayCategory,
    pub source: CategorySource,
}

/// Partial override write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideFields {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub internal_category: FieldUpdate<CategoryPin>,
    /// Resets the aging clock when set
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub override_date: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub condition_grade: FieldUpdate<ConditionGrade>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub ai_price: FieldUpdate<i64>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub ai_title: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub ai_description: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub approved: FieldUpdate<bool>,
}

impl OverrideFields {
    /// Write that only pins the internal category
    pub fn pin(category: DisplayCategory, source: CategorySource) -> Self {
        Self {
            internal_category: FieldUpdate::Set(CategoryPin { category, source }),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.internal_category.is_unchanged()
            && self.override_date.is_unchanged()
            && self.condition_grade.is_unchanged()
            && self.ai_price.is_unchanged()
            && self.ai_title.is_unchanged()
            && self.ai_description.is_unchanged()
            && self.approved.is_unchanged()
    }
}

/// Stored override row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub id: String,
    pub internal_category: Option<DisplayCategory>,
    pub category_source: Option<CategorySource>,
    pub override_date: Option<String>,
    pub condition_grade: Option<ConditionGrade>,
    pub ai_price: Option<i64>,
    pub ai_title: Option<String>,
    pub ai_description: Option<String>,
    pub approved: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OverrideEntry {
    /// Current pin, if any. Rows written before sources were tracked count as manual.
    pub fn pin(&self) -> Option<CategoryPin> {
        self.internal_category.map(|category| CategoryPin {
            category,
            source: self.category_source.unwrap_or(CategorySource::Manual),
        })
    }

    pub fn is_manually_pinned(&self) -> bool {
        matches!(self.pin(), Some(CategoryPin { source: CategorySource::Manual, .. }))
    }
}
