//! Brand tier table
//!
//! Maps a brand name (or alias) to a desirability tier and, optionally, the
//! archive category the brand is known for. Built once per run from the
//! `brand_tiers` table and read-only afterwards.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ArchiveCategory, BrandTier};
use std::collections::HashMap;

/// Minimum query length for "key contains query" matching
const MIN_REVERSE_MATCH_LEN: usize = 3;

/// One administrator-curated brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandTierEntry {
    /// Canonical name, uppercased
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub tier: BrandTier,
    /// Archive category this brand implies
    #[serde(default)]
    pub affinity: Option<ArchiveCategory>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BrandTierEntry {
    pub fn new(canonical: &str, tier: BrandTier, affinity: Option<ArchiveCategory>) -> Self {
        Self {
            canonical: normalize_brand(canonical),
            aliases: Vec::new(),
            tier,
            affinity,
            country: None,
            notes: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| normalize_brand(a)).collect();
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }
}

/// Uppercase, trim and collapse internal whitespace
pub fn normalize_brand(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Lookup structure over a set of entries
#[derive(Debug, Clone, Default)]
pub struct BrandTierTable {
    entries: Vec<BrandTierEntry>,
    /// Normalized key (canonical or alias) → entry index
    exact: HashMap<String, usize>,
    /// Keys longest first, for containment matching
    by_length: Vec<(String, usize)>,
}

impl BrandTierTable {
    pub fn new(entries: Vec<BrandTierEntry>) -> Self {
        let mut exact = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            exact.insert(normalize_brand(&entry.canonical), i);
            for alias in &entry.aliases {
                exact.entry(normalize_brand(alias)).or_insert(i);
            }
        }

        let mut by_length: Vec<(String, usize)> =
            exact.iter().map(|(key, &i)| (key.clone(), i)).collect();
        // Longest first; ties alphabetical so lookups are stable
        by_length.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            entries,
            exact,
            by_length,
        }
    }

    /// Table seeded with the built-in brand list
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BRANDS.clone())
    }

    pub fn entries(&self) -> &[BrandTierEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a brand string
    ///
    /// Exact key/alias match first, then the longest key that contains the
    /// query or is contained in it as whole words.
    pub fn lookup(&self, brand: &str) -> Option<&BrandTierEntry> {
        let query = normalize_brand(brand);
        if query.is_empty() {
            return None;
        }

        if let Some(&i) = self.exact.get(&query) {
            return Some(&self.entries[i]);
        }

        self.by_length
            .iter()
            .find(|(key, _)| {
                contains_words(&query, key)
                    || (query.len() >= MIN_REVERSE_MATCH_LEN && contains_words(key, &query))
            })
            .map(|(_, i)| &self.entries[*i])
    }

    /// Tier for a brand, `Other` when unknown
    pub fn tier_of(&self, brand: &str) -> BrandTier {
        self.lookup(brand).map(|e| e.tier).unwrap_or_default()
    }
}

/// `needle` occurs in `haystack` with no letter or digit on either side
fn contains_words(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Built-in brand list used to seed an empty `brand_tiers` table
pub static DEFAULT_BRANDS: Lazy<Vec<BrandTierEntry>> = Lazy::new(|| {
    use ArchiveCategory::*;
    use BrandTier::*;

    vec![
        BrandTierEntry::new("ROTHCO", Mid, Some(MilitaryArchive))
            .with_aliases(&["로스코"])
            .with_country("USA"),
        BrandTierEntry::new("ALPHA INDUSTRIES", Mid, Some(MilitaryArchive))
            .with_aliases(&["ALPHA", "알파인더스트리"])
            .with_country("USA"),
        BrandTierEntry::new("PROPPER", Low, Some(MilitaryArchive)).with_country("USA"),
        BrandTierEntry::new("BUZZ RICKSON'S", Premium, Some(MilitaryArchive))
            .with_aliases(&["BUZZ RICKSON", "버즈릭슨"])
            .with_country("Japan"),
        BrandTierEntry::new("CARHARTT", High, Some(WorkwearArchive))
            .with_aliases(&["CARHARTT WIP", "칼하트"])
            .with_country("USA"),
        BrandTierEntry::new("DICKIES", Mid, Some(WorkwearArchive))
            .with_aliases(&["디키즈"])
            .with_country("USA"),
        BrandTierEntry::new("RED KAP", Low, Some(WorkwearArchive)).with_country("USA"),
        BrandTierEntry::new("BEN DAVIS", Low, Some(WorkwearArchive)).with_country("USA"),
        BrandTierEntry::new("FILSON", Premium, Some(WorkwearArchive)).with_country("USA"),
        BrandTierEntry::new("PATAGONIA", High, Some(OutdoorArchive))
            .with_aliases(&["파타고니아"])
            .with_country("USA"),
        BrandTierEntry::new("THE NORTH FACE", High, Some(OutdoorArchive))
            .with_aliases(&["NORTH FACE", "TNF", "노스페이스"])
            .with_country("USA"),
        BrandTierEntry::new("ARC'TERYX", Premium, Some(OutdoorArchive))
            .with_aliases(&["ARCTERYX", "아크테릭스"])
            .with_country("Canada"),
        BrandTierEntry::new("VISVIM", Luxury, Some(JapaneseArchive)).with_country("Japan"),
        BrandTierEntry::new("KAPITAL", Premium, Some(JapaneseArchive))
            .with_aliases(&["캐피탈"])
            .with_country("Japan"),
        BrandTierEntry::new("NEEDLES", Premium, Some(JapaneseArchive)).with_country("Japan"),
        BrandTierEntry::new("BEAMS", Mid, Some(JapaneseArchive))
            .with_aliases(&["빔즈"])
            .with_country("Japan"),
        BrandTierEntry::new("PORTER", Mid, Some(JapaneseArchive)).with_country("Japan"),
        BrandTierEntry::new("GUCCI", Luxury, Some(HeritageEurope)).with_country("Italy"),
        BrandTierEntry::new("PRADA", Luxury, Some(HeritageEurope)).with_country("Italy"),
        BrandTierEntry::new("A.P.C.", High, Some(HeritageEurope))
            .with_aliases(&["APC", "아페쎄"])
            .with_country("France"),
        BrandTierEntry::new("BARBOUR", Premium, Some(BritishArchive))
            .with_aliases(&["바버"])
            .with_country("UK"),
        BrandTierEntry::new("BURBERRY", Luxury, Some(BritishArchive))
            .with_aliases(&["BURBERRYS", "버버리"])
            .with_country("UK"),
        BrandTierEntry::new("FRED PERRY", Mid, Some(BritishArchive))
            .with_aliases(&["프레드페리"])
            .with_country("UK"),
        BrandTierEntry::new("POLO RALPH LAUREN", High, Some(UnisexArchive))
            .with_aliases(&["RALPH LAUREN", "POLO", "폴로"])
            .with_country("USA"),
        BrandTierEntry::new("LEVI'S", Mid, Some(UnisexArchive))
            .with_aliases(&["LEVIS", "리바이스"])
            .with_country("USA"),
        BrandTierEntry::new("CHAMPION", Mid, Some(UnisexArchive))
            .with_aliases(&["챔피온"])
            .with_country("USA"),
    ]
});
