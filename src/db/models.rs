//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Promo code attributes
// ============================================================================

/// Promo code tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Starter,
    Standard,
}

impl CodeType {
    pub const ALL: [CodeType; 2] = [CodeType::Starter, CodeType::Standard];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodeType::Starter => "starter",
            CodeType::Standard => "standard",
        }
    }
}

/// Sales region a promo code is issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Americas,
    AsiaPacific,
    Emea,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Americas, Region::AsiaPacific, Region::Emea];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Americas => "americas",
            Region::AsiaPacific => "asia-pacific",
            Region::Emea => "emea",
        }
    }
}

/// Raised when a stored attribute is outside the known value set
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownValue {
    kind: &'static str,
    value: String,
}

impl FromStr for CodeType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(CodeType::Starter),
            "standard" => Ok(CodeType::Standard),
            _ => Err(UnknownValue {
                kind: "type",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Region {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "americas" => Ok(Region::Americas),
            "asia-pacific" => Ok(Region::AsiaPacific),
            "emea" => Ok(Region::Emea),
            _ => Err(UnknownValue {
                kind: "region",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CodeType {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for Region {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Promo codes and redemption requests
// ============================================================================

/// Promo code model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub code_type: CodeType,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

/// New promo code for insertion
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub code: String,
    pub code_type: CodeType,
    pub region: Region,
}

/// Redemption request model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeRequest {
    pub id: Uuid,
    pub user_identifier: String,
    pub promo_code_id: Uuid,
    pub business_email: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub code_type: CodeType,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A redemption request joined to the code it claimed
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemedCode {
    pub id: Uuid,
    pub code: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub code_type: CodeType,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub redeemed_at: DateTime<Utc>,
    pub promo_code_id: Uuid,
    pub verified: bool,
    pub business_email: String,
    pub user_identifier: String,
}

/// Columns scanned for code statistics
#[derive(Debug, Clone, FromRow)]
pub struct CodeStatRow {
    #[sqlx(rename = "type", try_from = "String")]
    pub code_type: CodeType,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub is_used: bool,
}

/// Columns scanned for redemption statistics
#[derive(Debug, Clone, FromRow)]
pub struct RequestStatRow {
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin allow-list entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: impl Into<String>, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            is_admin,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Blog posts
// ============================================================================

/// Languages every blog post carries a translation for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Es,
    Pt,
    De,
    Ja,
    Hi,
    Ru,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::Pt,
        Language::De,
        Language::Ja,
        Language::Hi,
        Language::Ru,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::Pt => "pt",
            Language::De => "de",
            Language::Ja => "ja",
            Language::Hi => "hi",
            Language::Ru => "ru",
        }
    }

    pub fn title_column(&self) -> String {
        format!("title_{}", self.code())
    }

    pub fn content_column(&self) -> String {
        format!("content_{}", self.code())
    }

    pub fn excerpt_column(&self) -> String {
        format!("excerpt_{}", self.code())
    }
}

/// All 24 localized column names, in storage order
pub fn localized_columns() -> Vec<String> {
    Language::ALL
        .iter()
        .flat_map(|l| [l.title_column(), l.content_column(), l.excerpt_column()])
        .collect()
}

/// One language's text for a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
}

/// Translations keyed by language; always contains every language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Language, Translation>")]
pub struct Translations(BTreeMap<Language, Translation>);

impl Default for Translations {
    fn default() -> Self {
        Self(
            Language::ALL
                .iter()
                .map(|l| (*l, Translation::default()))
                .collect(),
        )
    }
}

impl From<BTreeMap<Language, Translation>> for Translations {
    fn from(mut map: BTreeMap<Language, Translation>) -> Self {
        for lang in Language::ALL {
            map.entry(lang).or_default();
        }
        Self(map)
    }
}

impl Translations {
    pub fn get(&self, lang: Language) -> &Translation {
        // Every language is inserted on construction
        static EMPTY: Translation = Translation {
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
        };
        self.0.get(&lang).unwrap_or(&EMPTY)
    }

    pub fn get_mut(&mut self, lang: Language) -> &mut Translation {
        self.0.entry(lang).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Language, &Translation)> {
        self.0.iter()
    }
}

/// Blog post model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub author: String,
    pub category: String,
    pub tags: String,
    pub featured_image: String,
    pub published: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub translations: Translations,
}

impl BlogPost {
    /// Tags split on commas, trimmed, empties dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

fn text_or_empty(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

impl<'r> FromRow<'r, PgRow> for BlogPost {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let mut translations = Translations::default();
        for lang in Language::ALL {
            let t = translations.get_mut(lang);
            t.title = text_or_empty(row, &lang.title_column())?;
            t.content = text_or_empty(row, &lang.content_column())?;
            t.excerpt = text_or_empty(row, &lang.excerpt_column())?;
        }

        Ok(BlogPost {
            id: row.try_get("id")?,
            slug: text_or_empty(row, "slug")?,
            author: text_or_empty(row, "author")?,
            category: text_or_empty(row, "category")?,
            tags: text_or_empty(row, "tags")?,
            featured_image: text_or_empty(row, "featured_image")?,
            published: row.try_get::<Option<bool>, _>("published")?.unwrap_or(false),
            featured: row.try_get::<Option<bool>, _>("featured")?.unwrap_or(false),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            translations,
        })
    }
}

/// New blog post for creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewBlogPost {
    pub slug: String,
    pub author: String,
    pub category: String,
    pub tags: String,
    pub featured_image: String,
    pub published: bool,
    pub featured: bool,
    pub translations: Translations,
}

/// Per-language partial update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
}

/// Blog post update; only provided fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateBlogPost {
    pub slug: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub featured_image: Option<String>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    pub translations: BTreeMap<Language, TranslationPatch>,
}

impl UpdateBlogPost {
    /// Column/value pairs for every provided text field
    pub fn text_assignments(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let scalar = [
            ("slug", &self.slug),
            ("author", &self.author),
            ("category", &self.category),
            ("tags", &self.tags),
            ("featured_image", &self.featured_image),
        ];
        for (column, value) in scalar {
            if let Some(v) = value {
                out.push((column.to_string(), v.clone()));
            }
        }
        for (lang, patch) in &self.translations {
            if let Some(v) = &patch.title {
                out.push((lang.title_column(), v.clone()));
            }
            if let Some(v) = &patch.content {
                out.push((lang.content_column(), v.clone()));
            }
            if let Some(v) = &patch.excerpt {
                out.push((lang.excerpt_column(), v.clone()));
            }
        }
        out
    }

    /// Apply this patch to an in-memory post
    pub fn apply_to(&self, post: &mut BlogPost) {
        if let Some(v) = &self.slug {
            post.slug = v.clone();
        }
        if let Some(v) = &self.author {
            post.author = v.clone();
        }
        if let Some(v) = &self.category {
            post.category = v.clone();
        }
        if let Some(v) = &self.tags {
            post.tags = v.clone();
        }
        if let Some(v) = &self.featured_image {
            post.featured_image = v.clone();
        }
        if let Some(v) = self.published {
            post.published = v;
        }
        if let Some(v) = self.featured {
            post.featured = v;
        }
        for (lang, patch) in &self.translations {
            let t = post.translations.get_mut(*lang);
            if let Some(v) = &patch.title {
                t.title = v.clone();
            }
            if let Some(v) = &patch.content {
                t.content = v.clone();
            }
            if let Some(v) = &patch.excerpt {
                t.excerpt = v.clone();
            }
        }
    }
}

/// Columns scanned for blog statistics
#[derive(Debug, Clone, FromRow)]
pub struct BlogFlagRow {
    pub published: bool,
    pub featured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_serializes_kebab_case() {
        let json = serde_json::to_string(&Region::AsiaPacific).unwrap();
        assert_eq!(json, "\"asia-pacific\"");
        assert_eq!("ASIA-PACIFIC".parse::<Region>().unwrap(), Region::AsiaPacific);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("premium".parse::<CodeType>().is_err());
    }

    #[test]
    fn translations_fill_missing_languages() {
        let json = r#"{"en": {"title": "Hello"}}"#;
        let t: Translations = serde_json::from_str(json).unwrap();
        assert_eq!(t.get(Language::En).title, "Hello");
        assert_eq!(t.get(Language::En).content, "");
        assert_eq!(t.iter().count(), 8);
        assert_eq!(t.get(Language::Ru), &Translation::default());
    }

    #[test]
    fn tag_list_drops_blank_entries() {
        let post = BlogPost {
            id: Uuid::new_v4(),
            slug: "p".to_string(),
            author: String::new(),
            category: String::new(),
            tags: "rust, , backend ,".to_string(),
            featured_image: String::new(),
            published: false,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            translations: Translations::default(),
        };
        assert_eq!(post.tag_list(), vec!["rust", "backend"]);
    }

    #[test]
    fn localized_columns_cover_all_languages() {
        let cols = localized_columns();
        assert_eq!(cols.len(), 24);
        assert!(cols.contains(&"excerpt_hi".to_string()));
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut patch = UpdateBlogPost {
            author: Some("Ada".to_string()),
            ..Default::default()
        };
        patch.translations.insert(
            Language::Fr,
            TranslationPatch {
                title: Some("Bonjour".to_string()),
                ..Default::default()
            },
        );
        let assignments = patch.text_assignments();
        assert_eq!(
            assignments,
            vec![
                ("author".to_string(), "Ada".to_string()),
                ("title_fr".to_string(), "Bonjour".to_string()),
            ]
        );
    }
}
