use crate::compile::{Token, TokenStream};
use crate::story::Story;

/// `"an"` before a vowel, `"a"` otherwise.
pub fn article_for(word: &str) -> &'static str {
    match word.trim().chars().next() {
        Some(ch) if "aeiouAEIOU".contains(ch) => "an",
        _ => "a",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub step: usize,
    pub total: usize,
    pub blank: String,
    pub qualifier: Option<String>,
}

impl Prompt {
    pub fn progress(&self) -> String {
        format!("Step {} of {}", self.step, self.total)
    }

    pub fn question(&self) -> String {
        let blank = self.blank.to_lowercase();
        format!("Enter {} {}", article_for(&blank), blank)
    }
}

/// Fills in a stored story one blank at a time.
#[derive(Clone, Debug)]
pub struct PlaySession {
    title: String,
    tokens: Vec<Token>,
    blanks: Vec<usize>,
    answers: Vec<String>,
}

impl PlaySession {
    pub fn new(story: &Story) -> Self {
        Self::from_tokens(&story.title, &story.tokens)
    }

    pub fn from_tokens(title: &str, tokens: &TokenStream) -> Self {
        let tokens = tokens.tokens().to_vec();
        let blanks = tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.is_blank())
            .map(|(index, _)| index)
            .collect();
        Self {
            title: title.to_string(),
            tokens,
            blanks,
            answers: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn total(&self) -> usize {
        self.blanks.len()
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.blanks.len()
    }

    /// The blank waiting for an answer.
    pub fn prompt(&self) -> Option<Prompt> {
        let index = *self.blanks.get(self.answers.len())?;
        match &self.tokens[index] {
            Token::Blank { text, qualifier } => Some(Prompt {
                step: self.answers.len() + 1,
                total: self.total(),
                blank: text.clone(),
                qualifier: qualifier.clone(),
            }),
            Token::Plain(_) => None,
        }
    }

    /// Records an answer for the current blank. Blank answers are refused.
    pub fn answer(&mut self, word: &str) -> bool {
        let word = word.trim();
        if word.is_empty() || self.is_complete() {
            return false;
        }
        self.answers.push(word.to_string());
        true
    }

    /// Story text and answers in reading order, flagged `true` for answers.
    pub fn parts(&self) -> Vec<(&str, bool)> {
        let mut answers = self.answers.iter();
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Plain(text) => (text.as_str(), false),
                Token::Blank { text, .. } => match answers.next() {
                    Some(answer) => (answer.as_str(), true),
                    None => (text.as_str(), false),
                },
            })
            .collect()
    }

    /// The finished story, once every blank has an answer.
    pub fn result(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        Some(self.parts().into_iter().map(|(text, _)| text).collect())
    }
}
