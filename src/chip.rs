use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PayloadError;

pub const PAYLOAD_KIND: &str = "placeholder";
pub const DEFAULT_QUALIFIER: &str = "any";

/// The closed set of word categories a blank can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Adjective,
    Noun,
    Verb,
    Adverb,
    Person,
    Place,
    Emotion,
    Color,
    Number,
    Size,
    Time,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Adjective,
        Category::Noun,
        Category::Verb,
        Category::Adverb,
        Category::Person,
        Category::Place,
        Category::Emotion,
        Category::Color,
        Category::Number,
        Category::Size,
        Category::Time,
    ];

    /// Label shown on the palette. Nouns are presented as "Thing".
    pub fn display_name(self) -> &'static str {
        match self {
            Category::Adjective => "Adjective",
            Category::Noun => "Thing",
            Category::Verb => "Verb",
            Category::Adverb => "Adverb",
            Category::Person => "Person",
            Category::Place => "Place",
            Category::Emotion => "Emotion",
            Category::Color => "Color",
            Category::Number => "Number",
            Category::Size => "Size",
            Category::Time => "Time",
        }
    }

    /// Upper-case name carried in drag payloads.
    pub fn type_name(self) -> &'static str {
        match self {
            Category::Adjective => "ADJECTIVE",
            Category::Noun => "NOUN",
            Category::Verb => "VERB",
            Category::Adverb => "ADVERB",
            Category::Person => "PERSON",
            Category::Place => "PLACE",
            Category::Emotion => "EMOTION",
            Category::Color => "COLOR",
            Category::Number => "NUMBER",
            Category::Size => "SIZE",
            Category::Time => "TIME",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        if normalized == "thing" {
            return Some(Category::Noun);
        }
        Category::ALL
            .into_iter()
            .find(|category| category.type_name().eq_ignore_ascii_case(&normalized))
    }

    pub fn qualifiers(self) -> &'static [Qualifier] {
        match self {
            Category::Noun => &[Qualifier::Plural],
            Category::Verb => &[
                Qualifier::Past,
                Qualifier::Gerund,
                Qualifier::Future,
                Qualifier::PresentThird,
            ],
            Category::Adjective => &[Qualifier::Comparative, Qualifier::Superlative],
            Category::Time => &[
                Qualifier::TimeOfDay,
                Qualifier::Date,
                Qualifier::MonthSeason,
                Qualifier::YearEra,
            ],
            Category::Person => &[Qualifier::SpecificPerson, Qualifier::TypeOfPerson],
            Category::Adverb
            | Category::Place
            | Category::Emotion
            | Category::Color
            | Category::Number
            | Category::Size => &[],
        }
    }

    pub fn supports_qualifiers(self) -> bool {
        !self.qualifiers().is_empty()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Grammatical form attached to a blank. Absence means the plain form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Plural,
    Past,
    Gerund,
    Future,
    PresentThird,
    Comparative,
    Superlative,
    TimeOfDay,
    Date,
    MonthSeason,
    YearEra,
    SpecificPerson,
    TypeOfPerson,
}

impl Qualifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Qualifier::Plural => "plural",
            Qualifier::Past => "past",
            Qualifier::Gerund => "gerund",
            Qualifier::Future => "future",
            Qualifier::PresentThird => "present-3rd",
            Qualifier::Comparative => "comparative",
            Qualifier::Superlative => "superlative",
            Qualifier::TimeOfDay => "time-of-day",
            Qualifier::Date => "date",
            Qualifier::MonthSeason => "month-season",
            Qualifier::YearEra => "year-era",
            Qualifier::SpecificPerson => "specific-person",
            Qualifier::TypeOfPerson => "type-of-person",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let qualifier = match value.trim() {
            "plural" => Qualifier::Plural,
            "past" => Qualifier::Past,
            "gerund" => Qualifier::Gerund,
            "future" => Qualifier::Future,
            "present-3rd" => Qualifier::PresentThird,
            "comparative" => Qualifier::Comparative,
            "superlative" => Qualifier::Superlative,
            "time-of-day" => Qualifier::TimeOfDay,
            "date" => Qualifier::Date,
            "month-season" => Qualifier::MonthSeason,
            "year-era" => Qualifier::YearEra,
            "specific-person" => Qualifier::SpecificPerson,
            "type-of-person" => Qualifier::TypeOfPerson,
            _ => return None,
        };
        Some(qualifier)
    }

    pub fn category(self) -> Category {
        match self {
            Qualifier::Plural => Category::Noun,
            Qualifier::Past | Qualifier::Gerund | Qualifier::Future | Qualifier::PresentThird => {
                Category::Verb
            }
            Qualifier::Comparative | Qualifier::Superlative => Category::Adjective,
            Qualifier::TimeOfDay | Qualifier::Date | Qualifier::MonthSeason | Qualifier::YearEra => {
                Category::Time
            }
            Qualifier::SpecificPerson | Qualifier::TypeOfPerson => Category::Person,
        }
    }

    /// Short form used inside chip labels, e.g. `Verb (Past)`.
    pub fn chip_label(self) -> &'static str {
        match self {
            Qualifier::Plural => "Plural",
            Qualifier::Past => "Past",
            Qualifier::Gerund => "Gerund",
            Qualifier::Future => "Future",
            Qualifier::PresentThird => "Present 3rd",
            Qualifier::Comparative => "Comparative",
            Qualifier::Superlative => "Superlative",
            Qualifier::TimeOfDay => "Time of day",
            Qualifier::Date => "Date",
            Qualifier::MonthSeason => "Month / season",
            Qualifier::YearEra => "Year / era",
            Qualifier::SpecificPerson => "Specific",
            Qualifier::TypeOfPerson => "Type",
        }
    }

    pub fn menu_label(self) -> &'static str {
        match self {
            Qualifier::Plural => "Plural",
            Qualifier::Past => "Past",
            Qualifier::Gerund => "-ing",
            Qualifier::Future => "Future",
            Qualifier::PresentThird => "He/She/It",
            Qualifier::Comparative => "More",
            Qualifier::Superlative => "Most",
            Qualifier::TimeOfDay => "Time of day",
            Qualifier::Date => "Date",
            Qualifier::MonthSeason => "Month / season",
            Qualifier::YearEra => "Year / era",
            Qualifier::SpecificPerson => "Specific person",
            Qualifier::TypeOfPerson => "Type of person",
        }
    }

    pub fn example(self) -> &'static str {
        match self {
            Qualifier::Plural => "(books)",
            Qualifier::Past => "(walked)",
            Qualifier::Gerund => "(walking)",
            Qualifier::Future => "(will walk)",
            Qualifier::PresentThird => "(walks)",
            Qualifier::Comparative => "(bigger)",
            Qualifier::Superlative => "(biggest)",
            Qualifier::TimeOfDay => "(at dawn, 3:17 PM)",
            Qualifier::Date => "(July 4th)",
            Qualifier::MonthSeason => "(May, spring)",
            Qualifier::YearEra => "(1999, the 1800s)",
            Qualifier::SpecificPerson => "(Ana, Grandma, Leonard Cohen)",
            Qualifier::TypeOfPerson => "(bully, teacher, friend)",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable chip identity. Minted once, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChipId(Uuid);

impl ChipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for ChipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Catalog,
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChipKind {
    Catalog(Category),
    /// A word the author typed into the palette. Carries its upper-cased type name.
    Custom(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chip {
    id: ChipId,
    kind: ChipKind,
    qualifier: Option<Qualifier>,
    label: String,
}

impl Chip {
    pub fn catalog(category: Category, qualifier: Option<Qualifier>) -> Self {
        let qualifier = qualifier.filter(|q| q.category() == category);
        Self {
            id: ChipId::new(),
            kind: ChipKind::Catalog(category),
            qualifier,
            label: catalog_label(category, qualifier),
        }
    }

    pub fn custom(word: &str) -> Self {
        let word = word.trim();
        Self {
            id: ChipId::new(),
            kind: ChipKind::Custom(word.to_uppercase()),
            qualifier: None,
            label: word.to_string(),
        }
    }

    /// Rebuilds a chip from attributes read off a rendered node.
    pub fn from_parts(
        id: ChipId,
        kind: ChipKind,
        qualifier: Option<Qualifier>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            qualifier,
            label: label.into(),
        }
    }

    pub fn id(&self) -> ChipId {
        self.id
    }

    pub fn kind(&self) -> &ChipKind {
        &self.kind
    }

    pub fn category(&self) -> Option<Category> {
        match self.kind {
            ChipKind::Catalog(category) => Some(category),
            ChipKind::Custom(_) => None,
        }
    }

    pub fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn origin(&self) -> Origin {
        match self.kind {
            ChipKind::Catalog(_) => Origin::Catalog,
            ChipKind::Custom(_) => Origin::Custom,
        }
    }

    pub fn type_name(&self) -> &str {
        match &self.kind {
            ChipKind::Catalog(category) => category.type_name(),
            ChipKind::Custom(name) => name,
        }
    }
}

pub fn catalog_label(category: Category, qualifier: Option<Qualifier>) -> String {
    match qualifier {
        Some(q) => format!("{} ({})", category.display_name(), q.chip_label()),
        None => category.display_name().to_string(),
    }
}

/// Structured data carried by a palette drag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipPayload {
    pub kind: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_qualifier")]
    pub qualifier: String,
    pub label: String,
    #[serde(rename = "isCustom", default)]
    pub is_custom: bool,
}

fn default_qualifier() -> String {
    DEFAULT_QUALIFIER.to_string()
}

impl ChipPayload {
    pub fn catalog(category: Category, qualifier: Option<Qualifier>) -> Self {
        Self {
            kind: PAYLOAD_KIND.to_string(),
            type_name: category.type_name().to_string(),
            qualifier: qualifier
                .map(|q| q.as_str().to_string())
                .unwrap_or_else(default_qualifier),
            label: catalog_label(category, qualifier),
            is_custom: false,
        }
    }

    pub fn custom(word: &str) -> Self {
        Self {
            kind: PAYLOAD_KIND.to_string(),
            type_name: word.trim().to_uppercase(),
            qualifier: default_qualifier(),
            label: word.trim().to_string(),
            is_custom: true,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(data: &str) -> Result<Self, PayloadError> {
        let payload: ChipPayload = serde_json::from_str(data)?;
        if payload.kind != PAYLOAD_KIND {
            return Err(PayloadError::UnexpectedKind(payload.kind));
        }
        Ok(payload)
    }

    pub fn origin(&self) -> Origin {
        if self.is_custom {
            Origin::Custom
        } else {
            Origin::Catalog
        }
    }

    /// Validates the payload and mints a chip with a fresh id.
    pub fn into_chip(self) -> Result<Chip, PayloadError> {
        let label = self.label.trim();
        if label.is_empty() {
            return Err(PayloadError::EmptyLabel);
        }
        if self.is_custom {
            return Ok(Chip::custom(label));
        }
        let category = Category::from_label(&self.type_name)
            .ok_or_else(|| PayloadError::UnknownCategory(self.type_name.clone()))?;
        let qualifier = match self.qualifier.trim() {
            "" | DEFAULT_QUALIFIER => None,
            other => {
                let parsed = Qualifier::parse(other).filter(|q| q.category() == category);
                if parsed.is_none() {
                    return Err(PayloadError::ForeignQualifier {
                        category: category.display_name().to_string(),
                        qualifier: other.to_string(),
                    });
                }
                parsed
            }
        };
        Ok(Chip::from_parts(
            ChipId::new(),
            ChipKind::Catalog(category),
            qualifier,
            label,
        ))
    }
}
