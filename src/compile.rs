use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::chip::{Category, Chip};
use crate::editor::{Segment, SegmentList};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Plain(String),
    Blank {
        text: String,
        #[serde(default, alias = "form", skip_serializing_if = "Option::is_none")]
        qualifier: Option<String>,
    },
}

impl Token {
    pub fn plain(text: impl Into<String>) -> Self {
        Token::Plain(text.into())
    }

    pub fn blank(text: impl Into<String>, qualifier: Option<&str>) -> Self {
        Token::Blank {
            text: text.into(),
            qualifier: qualifier.map(str::to_string),
        }
    }

    pub fn blank_for_chip(chip: &Chip) -> Self {
        Token::blank(chip.label(), chip.qualifier().map(|q| q.as_str()))
    }

    pub fn text(&self) -> &str {
        match self {
            Token::Plain(text) | Token::Blank { text, .. } => text,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Blank { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenStream(Vec<Token>);

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    pub fn blank_count(&self) -> usize {
        self.0.iter().filter(|token| token.is_blank()).count()
    }
}

impl FromIterator<Token> for TokenStream {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Words that count as blanks when typed into free text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeywordCatalog {
    keywords: Vec<(String, Category)>,
}

impl KeywordCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut catalog = Self::empty();
        for category in categories {
            catalog = catalog.with_keyword(category.display_name(), category);
        }
        catalog
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>, category: Category) -> Self {
        let keyword = keyword.into();
        if !keyword.is_empty() && !self.keywords.iter().any(|(k, _)| *k == keyword) {
            self.keywords.push((keyword, category));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn category_of(&self, keyword: &str) -> Option<Category> {
        self.keywords
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, category)| *category)
    }

    /// Whole-word, case-sensitive alternation, longest keyword first so that
    /// overlapping keywords resolve to the longer one.
    fn matcher(&self) -> Option<Regex> {
        if self.keywords.is_empty() {
            return None;
        }
        let mut words: Vec<&str> = self.keywords.iter().map(|(k, _)| k.as_str()).collect();
        words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        let alternation = words
            .iter()
            .map(|word| regex::escape(word))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&format!(r"\b(?:{alternation})\b")) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::debug!(%err, "keyword matcher unavailable, compiling without it");
                None
            }
        }
    }
}

/// Chips become blanks directly. Free text is also scanned for category
/// names typed as whole words, and each one found becomes a blank of its own.
pub fn compile(list: &SegmentList, catalog: &KeywordCatalog) -> TokenStream {
    let matcher = catalog.matcher();
    let mut tokens = Vec::new();
    for segment in list.segments() {
        match segment {
            Segment::Placeholder(chip) => tokens.push(Token::blank_for_chip(chip)),
            Segment::Text(text) => split_keywords(text, matcher.as_ref(), &mut tokens),
        }
    }
    TokenStream(tokens)
}

fn split_keywords(text: &str, matcher: Option<&Regex>, tokens: &mut Vec<Token>) {
    let Some(matcher) = matcher else {
        tokens.push(Token::plain(text));
        return;
    };
    let mut last = 0;
    for found in matcher.find_iter(text) {
        if found.start() > last {
            tokens.push(Token::plain(&text[last..found.start()]));
        }
        tokens.push(Token::blank(found.as_str(), None));
        last = found.end();
    }
    if last < text.len() {
        tokens.push(Token::plain(&text[last..]));
    }
}
