use crate::chip::{Category, ChipPayload, Origin, Qualifier};
use crate::compile::KeywordCatalog;
use crate::config::EditorConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub category: Category,
    selected: Option<Qualifier>,
}

impl PaletteEntry {
    pub fn selected(&self) -> Option<Qualifier> {
        self.selected
    }

    /// Text shown on the palette button.
    pub fn label(&self) -> String {
        match self.selected {
            Some(q) => format!("{} · {}", self.category.display_name(), q.menu_label()),
            None => self.category.display_name().to_string(),
        }
    }
}

/// The word palette chips are dragged from.
///
/// A category's form selection is used for exactly one placement. Custom
/// words are single-use.
#[derive(Clone, Debug)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    custom_words: Vec<String>,
    inline_keywords: bool,
}

impl Palette {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            entries: config
                .categories
                .iter()
                .map(|category| PaletteEntry {
                    category: *category,
                    selected: None,
                })
                .collect(),
            custom_words: Vec::new(),
            inline_keywords: config.inline_keywords,
        }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn entry(&self, category: Category) -> Option<&PaletteEntry> {
        self.entries.iter().find(|entry| entry.category == category)
    }

    fn entry_mut(&mut self, category: Category) -> Option<&mut PaletteEntry> {
        self.entries.iter_mut().find(|entry| entry.category == category)
    }

    /// Chooses the form used by the next placement of `category`.
    /// Forms belonging to another category are refused.
    pub fn select_qualifier(&mut self, category: Category, qualifier: Option<Qualifier>) -> bool {
        if qualifier.is_some_and(|q| q.category() != category) {
            return false;
        }
        match self.entry_mut(category) {
            Some(entry) if entry.selected != qualifier => {
                entry.selected = qualifier;
                true
            }
            _ => false,
        }
    }

    pub fn selected(&self, category: Category) -> Option<Qualifier> {
        self.entry(category).and_then(PaletteEntry::selected)
    }

    pub fn reset(&mut self, category: Category) -> bool {
        self.select_qualifier(category, None)
    }

    /// Steps through the forms of `category`, wrapping back to the default.
    pub fn cycle_qualifier(&mut self, category: Category) -> Option<Qualifier> {
        let forms = category.qualifiers();
        let next = match self.selected(category) {
            None => forms.first().copied(),
            Some(current) => forms
                .iter()
                .position(|q| *q == current)
                .and_then(|index| forms.get(index + 1))
                .copied(),
        };
        self.select_qualifier(category, next);
        self.selected(category)
    }

    pub fn payload_for(&self, category: Category) -> Option<ChipPayload> {
        self.entry(category)
            .map(|entry| ChipPayload::catalog(category, entry.selected))
    }

    pub fn custom_words(&self) -> &[String] {
        &self.custom_words
    }

    /// Adds a word of the author's own. The first letter is upper-cased; blank
    /// and duplicate words are refused.
    pub fn add_custom_word(&mut self, word: &str) -> Option<String> {
        let word = word.trim();
        let mut chars = word.chars();
        let first = chars.next()?;
        let word: String = first.to_uppercase().chain(chars).collect();
        if self.custom_words.contains(&word) {
            return None;
        }
        self.custom_words.push(word.clone());
        Some(word)
    }

    pub fn custom_payload(&self, word: &str) -> Option<ChipPayload> {
        self.custom_words
            .iter()
            .find(|w| *w == word)
            .map(|w| ChipPayload::custom(w))
    }

    /// Removes a placed custom word for good.
    pub fn consume_custom(&mut self, word: &str) -> bool {
        let before = self.custom_words.len();
        self.custom_words.retain(|w| w != word);
        self.custom_words.len() != before
    }

    /// Bookkeeping after a chip from `payload` landed in the story.
    pub fn placed(&mut self, payload: &ChipPayload) {
        match payload.origin() {
            Origin::Catalog => {
                if let Some(category) = Category::from_label(&payload.type_name) {
                    self.reset(category);
                }
            }
            Origin::Custom => {
                self.consume_custom(payload.label.trim());
            }
        }
    }

    pub fn keyword_catalog(&self) -> KeywordCatalog {
        if !self.inline_keywords {
            return KeywordCatalog::empty();
        }
        KeywordCatalog::from_categories(self.entries.iter().map(|entry| entry.category))
    }
}
