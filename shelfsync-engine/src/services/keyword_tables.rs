//! Per-category keyword tables for the archive classifier
//!
//! Keywords are matched case-insensitively as substrings of
//! `name + " " + brand`. Korean variants sit next to their English forms.

use once_cell::sync::Lazy;
use shelfsync_common::models::ArchiveCategory;

/// Keyword list for one archive category
#[derive(Debug, Clone)]
pub struct CategoryKeywords {
    pub category: ArchiveCategory,
    /// Lowercased keywords
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    pub fn new(category: ArchiveCategory, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Keywords present in `haystack` (already lowercased), each once
    pub fn matches<'a>(&'a self, haystack: &str) -> Vec<&'a str> {
        let mut found: Vec<&str> = Vec::new();
        for keyword in &self.keywords {
            if haystack.contains(keyword.as_str()) && !found.contains(&keyword.as_str()) {
                found.push(keyword.as_str());
            }
        }
        found
    }
}

/// Full keyword table, one entry per classified category
#[derive(Debug, Clone)]
pub struct KeywordTable {
    categories: Vec<CategoryKeywords>,
}

impl KeywordTable {
    pub fn new(categories: Vec<CategoryKeywords>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[CategoryKeywords] {
        &self.categories
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        DEFAULT_KEYWORDS.clone()
    }
}

/// Built-in keyword table
pub static DEFAULT_KEYWORDS: Lazy<KeywordTable> = Lazy::new(|| {
    use ArchiveCategory::*;

    KeywordTable::new(vec![
        CategoryKeywords::new(
            MilitaryArchive,
            &[
                "m-65", "m65", "ma-1", "ma1", "n-3b", "n3b", "n-1", "bdu", "army", "navy",
                "military", "combat", "field jacket", "cargo", "fatigue", "usmc", "usaf",
                "camo", "flight jacket", "deck jacket", "rothco", "alpha industries",
                "propper", "buzz rickson", "밀리터리", "군용", "카고", "야상", "항공점퍼",
            ],
        ),
        CategoryKeywords::new(
            WorkwearArchive,
            &[
                "carhartt", "dickies", "workwear", "work jacket", "chore", "coverall",
                "overall", "double knee", "painter", "duck canvas", "red kap", "ben davis",
                "filson", "워크웨어", "작업복", "초어",
            ],
        ),
        CategoryKeywords::new(
            OutdoorArchive,
            &[
                "patagonia", "north face", "arc'teryx", "arcteryx", "gore-tex", "goretex",
                "fleece", "anorak", "mountain", "retro-x", "synchilla", "nuptse", "아웃도어",
                "플리스", "등산",
            ],
        ),
        CategoryKeywords::new(
            JapaneseArchive,
            &[
                "visvim", "kapital", "beams", "porter", "needles", "neighborhood", "wtaps",
                "undercover", "comme des garcons", "yohji", "issey miyake", "nanamica",
                "selvedge", "sashiko", "boro", "일본", "사시코",
            ],
        ),
        CategoryKeywords::new(
            HeritageEurope,
            &[
                "gucci", "prada", "a.p.c.", "apc", "hermes", "loro piana", "stone island",
                "cp company", "heritage", "made in italy", "made in france", "헤리티지",
            ],
        ),
        CategoryKeywords::new(
            BritishArchive,
            &[
                "burberry", "barbour", "fred perry", "aquascutum", "mackintosh", "baracuta",
                "harrington", "duffle", "tweed", "made in england", "made in uk", "버버리",
                "바버", "더플",
            ],
        ),
        CategoryKeywords::new(
            UnisexArchive,
            &[
                "ralph lauren", "polo", "levi's", "levis", "champion", "unisex", "oversize",
                "oversized", "one size", "free size", "오버핏", "프리사이즈",
            ],
        ),
    ])
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_classified_category_has_keywords() {
        let table = KeywordTable::default();
        for category in ArchiveCategory::CLASSIFIED {
            let entry = table
                .categories()
                .iter()
                .find(|c| c.category == category)
                .unwrap_or_else(|| panic!("missing keywords for {}", category));
            assert!(!entry.keywords.is_empty());
        }
    }

    #[test]
    fn test_matches_are_distinct() {
        let keywords = CategoryKeywords::new(ArchiveCategory::MilitaryArchive, &["army", "ARMY", "navy"]);
        let found = keywords.matches("army surplus army navy");
        assert_eq!(found, vec!["army", "navy"]);
    }

    #[test]
    fn test_keywords_are_lowercased() {
        let keywords = CategoryKeywords::new(ArchiveCategory::BritishArchive, &["Barbour"]);
        assert_eq!(keywords.matches("barbour bedale"), vec!["barbour"]);
        assert!(keywords.matches("BARBOUR").is_empty());
    }
}
