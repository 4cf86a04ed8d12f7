//! Domain enums shared by the engine and its HTTP surface
//!
//! Category, stage and tier decisions are tagged variants so that adding a
//! category is a compile-time-checked change in every `match`.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing status of a product in the external catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus {
    OnSale,
    OutOfStock,
    Suspended,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 3] = [
        ProductStatus::OnSale,
        ProductStatus::OutOfStock,
        ProductStatus::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::OnSale => "on-sale",
            ProductStatus::OutOfStock => "out-of-stock",
            ProductStatus::Suspended => "suspended",
        }
    }

    /// Status code used by the catalog API
    pub fn wire_code(&self) -> &'static str {
        match self {
            ProductStatus::OnSale => "SALE",
            ProductStatus::OutOfStock => "OUTOFSTOCK",
            ProductStatus::Suspended => "SUSPENSION",
        }
    }

    /// Map a catalog status code; statuses outside the model yield `None`
    pub fn from_wire(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "SALE" => Some(ProductStatus::OnSale),
            "OUTOFSTOCK" => Some(ProductStatus::OutOfStock),
            "SUSPENSION" => Some(ProductStatus::Suspended),
            _ => None,
        }
    }
}

impl FromStr for ProductStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown product status: {}", s)))
    }
}

/// Time-based lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleStage {
    /// Age [0, 30) days
    New,
    /// Age [30, 60) days
    Curated,
    /// Age [60, 120) days
    Archive,
    /// Age 120 days and older
    Clearance,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::New => "NEW",
            LifecycleStage::Curated => "CURATED",
            LifecycleStage::Archive => "ARCHIVE",
            LifecycleStage::Clearance => "CLEARANCE",
        }
    }

    /// Stages whose products receive an archive sub-category
    pub fn is_aged(&self) -> bool {
        matches!(self, LifecycleStage::Archive | LifecycleStage::Clearance)
    }
}

impl FromStr for LifecycleStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(LifecycleStage::New),
            "CURATED" => Ok(LifecycleStage::Curated),
            "ARCHIVE" => Ok(LifecycleStage::Archive),
            "CLEARANCE" => Ok(LifecycleStage::Clearance),
            other => Err(Error::InvalidInput(format!("Unknown lifecycle stage: {}", other))),
        }
    }
}

/// Content-based archive sub-category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveCategory {
    MilitaryArchive,
    WorkwearArchive,
    OutdoorArchive,
    JapaneseArchive,
    HeritageEurope,
    BritishArchive,
    UnisexArchive,
    Uncategorized,
}

impl ArchiveCategory {
    /// Every assignable category, in default tie-break priority order
    pub const CLASSIFIED: [ArchiveCategory; 7] = [
        ArchiveCategory::MilitaryArchive,
        ArchiveCategory::WorkwearArchive,
        ArchiveCategory::OutdoorArchive,
        ArchiveCategory::JapaneseArchive,
        ArchiveCategory::HeritageEurope,
        ArchiveCategory::BritishArchive,
        ArchiveCategory::UnisexArchive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveCategory::MilitaryArchive => "military-archive",
            ArchiveCategory::WorkwearArchive => "workwear-archive",
            ArchiveCategory::OutdoorArchive => "outdoor-archive",
            ArchiveCategory::JapaneseArchive => "japanese-archive",
            ArchiveCategory::HeritageEurope => "heritage-europe",
            ArchiveCategory::BritishArchive => "british-archive",
            ArchiveCategory::UnisexArchive => "unisex-archive",
            ArchiveCategory::Uncategorized => "uncategorized",
        }
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, ArchiveCategory::Uncategorized)
    }
}

impl fmt::Display for ArchiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ArchiveCategory::CLASSIFIED
            .into_iter()
            .chain(std::iter::once(ArchiveCategory::Uncategorized))
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown archive category: {}", s)))
    }
}

/// Administrator-curated desirability rank of a brand
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BrandTier {
    Luxury,
    Premium,
    High,
    Mid,
    Low,
    #[default]
    Other,
}

impl BrandTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrandTier::Luxury => "LUXURY",
            BrandTier::Premium => "PREMIUM",
            BrandTier::High => "HIGH",
            BrandTier::Mid => "MID",
            BrandTier::Low => "LOW",
            BrandTier::Other => "OTHER",
        }
    }
}

impl FromStr for BrandTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LUXURY" => Ok(BrandTier::Luxury),
            "PREMIUM" => Ok(BrandTier::Premium),
            "HIGH" => Ok(BrandTier::High),
            "MID" | "MIDDLE" => Ok(BrandTier::Mid),
            "LOW" => Ok(BrandTier::Low),
            "OTHER" => Ok(BrandTier::Other),
            other => Err(Error::InvalidInput(format!("Unknown brand tier: {}", other))),
        }
    }
}

/// Target segment parsed from the product name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Man,
    Woman,
    Kids,
    Unisex,
    #[default]
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Man => "MAN",
            Gender::Woman => "WOMAN",
            Gender::Kids => "KIDS",
            Gender::Unisex => "UNISEX",
            Gender::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "MAN" | "MEN" => Gender::Man,
            "WOMAN" | "WOMEN" => Gender::Woman,
            "KIDS" | "KID" => Gender::Kids,
            "UNISEX" => Gender::Unisex,
            _ => Gender::Unknown,
        }
    }
}

/// Condition grade assigned at inspection, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionGrade {
    V,
    S,
    A,
    B,
}

impl ConditionGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionGrade::V => "V",
            ConditionGrade::S => "S",
            ConditionGrade::A => "A",
            ConditionGrade::B => "B",
        }
    }
}

impl FromStr for ConditionGrade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "V" => Ok(ConditionGrade::V),
            "S" => Ok(ConditionGrade::S),
            "A" => Ok(ConditionGrade::A),
            "B" => Ok(ConditionGrade::B),
            other => Err(Error::InvalidInput(format!("Unknown condition grade: {}", other))),
        }
    }
}

/// Garment family parsed from the product name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClothingType {
    Top,
    Bottom,
    Outer,
    Dress,
    #[default]
    Other,
}

impl ClothingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClothingType::Top => "top",
            ClothingType::Bottom => "bottom",
            ClothingType::Outer => "outer",
            ClothingType::Dress => "dress",
            ClothingType::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" => ClothingType::Top,
            "bottom" => ClothingType::Bottom,
            "outer" => ClothingType::Outer,
            "dress" => ClothingType::Dress,
            _ => ClothingType::Other,
        }
    }
}

/// Who wrote an internal-category pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// Administrator pin; rebalancing never moves it
    Manual,
    /// Written by the rebalance job
    Automatic,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySource::Manual => "manual",
            CategorySource::Automatic => "automatic",
        }
    }
}

impl FromStr for CategorySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "manual" => Ok(CategorySource::Manual),
            "automatic" => Ok(CategorySource::Automatic),
            other => Err(Error::InvalidInput(format!("Unknown category source: {}", other))),
        }
    }
}

/// Storefront section a product is displayed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayCategory {
    New,
    Curated,
    /// Aged item without a confident archive sub-category
    ArchiveRoot,
    Archive(ArchiveCategory),
    Clearance,
}

impl DisplayCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayCategory::New => "new",
            DisplayCategory::Curated => "curated",
            DisplayCategory::ArchiveRoot => "archive-root",
            DisplayCategory::Archive(category) => category.as_str(),
            DisplayCategory::Clearance => "clearance",
        }
    }

    /// Natural section for a stage and (optional) archive classification
    pub fn for_stage(stage: LifecycleStage, archive: Option<ArchiveCategory>) -> Self {
        match stage {
            LifecycleStage::New => DisplayCategory::New,
            LifecycleStage::Curated => DisplayCategory::Curated,
            LifecycleStage::Archive => match archive {
                Some(category) if category.is_classified() => DisplayCategory::Archive(category),
                _ => DisplayCategory::ArchiveRoot,
            },
            LifecycleStage::Clearance => DisplayCategory::Clearance,
        }
    }
}

impl fmt::Display for DisplayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(DisplayCategory::New),
            "curated" => Ok(DisplayCategory::Curated),
            "archive-root" | "archive" => Ok(DisplayCategory::ArchiveRoot),
            "clearance" => Ok(DisplayCategory::Clearance),
            other => match other.parse::<ArchiveCategory>() {
                Ok(category) if category.is_classified() => Ok(DisplayCategory::Archive(category)),
                _ => Err(Error::InvalidInput(format!("Unknown display category: {}", s))),
            },
        }
    }
}

impl TryFrom<String> for DisplayCategory {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DisplayCategory> for String {
    fn from(value: DisplayCategory) -> Self {
        value.as_str().to_string()
    }
}
