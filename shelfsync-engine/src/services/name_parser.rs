//! Product name parser
//!
//! Listing names follow a loose convention:
//! `BRAND 한글브랜드 description ... [grade] GENDER - SIZE`, e.g.
//! `Barbour 바버 비데일 왁스 자켓 S급 MAN - 100`.

use once_cell::sync::Lazy;
use regex::Regex;
use shelfsync_common::models::{ClothingType, ConditionGrade, Gender};

use crate::models::ProductAttributes;

static GENDER_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(MAN|WOMAN|KIDS|UNISEX)\s*[-\s]\s*(\S+)$").expect("valid gender/size pattern")
});

static GRADE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[([VSAB])\]|(?:^|\s)([VSAB])급").expect("valid grade pattern")
});

static HANGUL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[가-힣]").expect("valid hangul pattern"));

/// Garment keywords per clothing type, checked in this order
const CLOTHING_KEYWORDS: &[(ClothingType, &[&str])] = &[
    (ClothingType::Dress, &["dress", "원피스"]),
    (
        ClothingType::Outer,
        &[
            "jacket", "parka", "coat", "anorak", "blouson", "vest", "fleece", "jumper",
            "자켓", "재킷", "점퍼", "코트", "패딩", "야상", "베스트",
        ],
    ),
    (
        ClothingType::Bottom,
        &[
            "pants", "trousers", "jeans", "shorts", "skirt", "chino", "cargo", "overall",
            "팬츠", "바지", "청바지", "반바지", "스커트",
        ],
    ),
    (
        ClothingType::Top,
        &[
            "shirt", "tee", "t-shirt", "sweatshirt", "hoodie", "knit", "sweater", "cardigan",
            "polo shirt", "셔츠", "티셔츠", "맨투맨", "후드", "니트", "스웨터", "가디건",
        ],
    ),
];

/// Parse brand, gender, size, garment type and grade out of a listing name
pub fn parse_product_name(name: &str) -> ProductAttributes {
    let mut remaining = name.trim().to_string();
    let mut attributes = ProductAttributes::default();

    if let Some(caps) = GENDER_SIZE.captures(&remaining) {
        attributes.gender = Gender::parse(&caps[1]);
        let size = caps[2].trim_end_matches("인치").to_string();
        if !size.is_empty() {
            attributes.size = Some(size);
        }
        if let Some(whole) = caps.get(0) {
            remaining.truncate(whole.start());
        }
    }

    if let Some(caps) = GRADE.captures(&remaining) {
        let letter = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        attributes.grade = letter.and_then(|l| l.parse::<ConditionGrade>().ok());
    }

    attributes.brand = extract_brand(remaining.trim());

    let (clothing_type, subtype) = detect_clothing_type(&remaining.to_lowercase());
    attributes.clothing_type = clothing_type;
    attributes.clothing_subtype = subtype;

    attributes
}

/// Leading Latin run before the first Korean word, or the first word
///
/// Runs that start with a model code such as `M-65` carry no brand.
fn extract_brand(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let first_korean = words.iter().position(|w| HANGUL.is_match(w));

    let brand = match first_korean {
        Some(0) => return None,
        Some(i) => words[..i].join(" "),
        None => words.first().map(|w| w.to_string()).unwrap_or_default(),
    };

    let brand = brand.trim().to_string();
    let starts_with_code = brand
        .split_whitespace()
        .next()
        .is_some_and(|w| w.chars().any(|c| c.is_ascii_digit()) || !w.starts_with(char::is_alphabetic));
    if brand.is_empty() || starts_with_code {
        None
    } else {
        Some(brand)
    }
}

fn detect_clothing_type(lowered: &str) -> (ClothingType, Option<String>) {
    for (clothing_type, keywords) in CLOTHING_KEYWORDS {
        if let Some(keyword) = keywords.iter().find(|k| lowered.contains(*k)) {
            return (*clothing_type, Some(keyword.to_string()));
        }
    }
    (ClothingType::Other, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_listing_name() {
        let parsed = parse_product_name("Barbour 바버 비데일 왁스 자켓 S급 MAN - 100");
        assert_eq!(parsed.brand.as_deref(), Some("Barbour"));
        assert_eq!(parsed.gender, Gender::Man);
        assert_eq!(parsed.size.as_deref(), Some("100"));
        assert_eq!(parsed.clothing_type, ClothingType::Outer);
        assert_eq!(parsed.clothing_subtype.as_deref(), Some("자켓"));
        assert_eq!(parsed.grade, Some(ConditionGrade::S));
    }

    #[test]
    fn test_multi_word_latin_brand() {
        let parsed = parse_product_name("Polo Ralph Lauren 폴로 옥스포드 셔츠 UNISEX - L");
        assert_eq!(parsed.brand.as_deref(), Some("Polo Ralph Lauren"));
        assert_eq!(parsed.gender, Gender::Unisex);
        assert_eq!(parsed.clothing_type, ClothingType::Top);
    }

    #[test]
    fn test_kids_suffix_and_inch_size() {
        let parsed = parse_product_name("Levi's 리바이스 청바지 KIDS - 28인치");
        assert_eq!(parsed.gender, Gender::Kids);
        assert_eq!(parsed.size.as_deref(), Some("28"));
        assert_eq!(parsed.clothing_type, ClothingType::Bottom);
    }

    #[test]
    fn test_english_only_name_uses_first_word() {
        let parsed = parse_product_name("Pendleton Board Shirt");
        assert_eq!(parsed.brand.as_deref(), Some("Pendleton"));
        assert_eq!(parsed.clothing_type, ClothingType::Top);
    }

    #[test]
    fn test_model_code_is_not_a_brand() {
        let parsed = parse_product_name("M-65 Field Jacket Rothco");
        assert!(parsed.brand.is_none());
        assert_eq!(parsed.gender, Gender::Unknown);
        assert_eq!(parsed.clothing_type, ClothingType::Outer);
        assert!(parsed.grade.is_none());
    }

    #[test]
    fn test_bracket_grade() {
        let parsed = parse_product_name("[V] Visvim 비즈빔 셔츠");
        assert_eq!(parsed.grade, Some(ConditionGrade::V));
    }

    #[test]
    fn test_korean_first_has_no_brand() {
        let parsed = parse_product_name("빈티지 니트 스웨터");
        assert!(parsed.brand.is_none());
        assert_eq!(parsed.clothing_type, ClothingType::Top);
    }

    #[test]
    fn test_empty_name() {
        let parsed = parse_product_name("   ");
        assert_eq!(parsed, ProductAttributes::default());
    }
}
