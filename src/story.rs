use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compile::TokenStream;
use crate::error::{StoreError, StoryKeyError};

pub const INVITE_CODE_LEN: usize = 6;
pub const MAX_CODE_ATTEMPTS: usize = 50;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short code players type to join a story. Always upper case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    pub fn parse(value: &str) -> Result<Self, StoryKeyError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StoryKeyError::Empty);
        }
        if value.chars().count() != INVITE_CODE_LEN
            || !value.chars().all(|ch| ch.is_ascii_alphanumeric())
        {
            return Err(StoryKeyError::Unrecognized(value.to_string()));
        }
        Ok(Self(value.to_ascii_uppercase()))
    }

    pub fn generate(rng: &mut impl Rng) -> Self {
        let code = (0..INVITE_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(Uuid);

impl StoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// How a player refers to a story.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoryKey {
    Code(InviteCode),
    Id(StoryId),
}

impl StoryKey {
    pub fn parse(value: &str) -> Result<Self, StoryKeyError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StoryKeyError::Empty);
        }
        if let Ok(code) = InviteCode::parse(value) {
            return Ok(StoryKey::Code(code));
        }
        Uuid::parse_str(value)
            .map(|id| StoryKey::Id(StoryId(id)))
            .map_err(|_| StoryKeyError::Unrecognized(value.to_string()))
    }
}

impl FromStr for StoryKey {
    type Err = StoryKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for StoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryKey::Code(code) => fmt::Display::fmt(code, f),
            StoryKey::Id(id) => fmt::Display::fmt(id, f),
        }
    }
}

/// Bearer token of a signed-in author. Stories can be created without one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub story_id: StoryId,
    pub invite_code: InviteCode,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "story")]
    pub tokens: TokenStream,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Signed-in players who opened the story, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub played_by: Vec<String>,
}

impl Story {
    pub fn is_owned_by(&self, user: &AuthToken) -> bool {
        self.owner.as_deref() == Some(user.as_str())
    }

    fn matches(&self, key: &StoryKey) -> bool {
        match key {
            StoryKey::Code(code) => self.invite_code == *code,
            StoryKey::Id(id) => self.story_id == *id,
        }
    }
}

/// A signed-in user's stories: the ones they wrote and the ones they played.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserStories {
    pub created: Vec<Story>,
    pub played: Vec<Story>,
}

/// Where finished stories live.
///
/// A story is created up front to reserve its invite code, then updated with a
/// title and compiled tokens whenever the author saves. Players find it again
/// by invite code or by id.
pub trait StoryStore {
    /// Reserves a new story with a unique invite code.
    fn create_story(&mut self, owner: Option<&AuthToken>) -> Result<Story, StoreError>;

    fn update_story(
        &mut self,
        id: StoryId,
        title: &str,
        tokens: &TokenStream,
    ) -> Result<Story, StoreError>;

    fn get_story(&self, key: &StoryKey) -> Result<Story, StoreError>;

    fn list_stories(&self, user: &AuthToken) -> UserStories;

    /// Removes a story. Only its owner may do so.
    fn delete_story(&mut self, key: &StoryKey, user: &AuthToken) -> Result<Story, StoreError>;

    /// Looks a story up for playing and, when the player is signed in,
    /// remembers that they played it.
    fn record_play(
        &mut self,
        key: &StoryKey,
        player: Option<&AuthToken>,
    ) -> Result<Story, StoreError>;
}

#[derive(Debug)]
pub struct MemoryStore<R = StdRng> {
    stories: Vec<Story>,
    rng: R,
}

impl MemoryStore<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    fn from_stories(stories: Vec<Story>) -> Self {
        Self {
            stories,
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for MemoryStore<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MemoryStore<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            stories: Vec::new(),
            rng,
        }
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    fn unused_code(&mut self) -> Result<InviteCode, StoreError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = InviteCode::generate(&mut self.rng);
            if !self.stories.iter().any(|story| story.invite_code == code) {
                return Ok(code);
            }
        }
        Err(StoreError::CodesExhausted(MAX_CODE_ATTEMPTS))
    }
}

impl<R: Rng> StoryStore for MemoryStore<R> {
    fn create_story(&mut self, owner: Option<&AuthToken>) -> Result<Story, StoreError> {
        let story = Story {
            story_id: StoryId::new(),
            invite_code: self.unused_code()?,
            title: String::new(),
            tokens: TokenStream::default(),
            owner: owner.map(|token| token.as_str().to_string()),
            played_by: Vec::new(),
        };
        tracing::debug!(
            id = %story.story_id,
            code = %story.invite_code,
            anonymous = story.owner.is_none(),
            "created story"
        );
        self.stories.push(story.clone());
        Ok(story)
    }

    fn update_story(
        &mut self,
        id: StoryId,
        title: &str,
        tokens: &TokenStream,
    ) -> Result<Story, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::TitleMissing);
        }
        let story = self
            .stories
            .iter_mut()
            .find(|story| story.story_id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        story.title = title.to_string();
        story.tokens = tokens.clone();
        Ok(story.clone())
    }

    fn get_story(&self, key: &StoryKey) -> Result<Story, StoreError> {
        self.stories
            .iter()
            .find(|story| story.matches(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn list_stories(&self, user: &AuthToken) -> UserStories {
        let played = |story: &&Story| story.played_by.iter().any(|p| p == user.as_str());
        UserStories {
            created: self
                .stories
                .iter()
                .filter(|story| story.is_owned_by(user))
                .cloned()
                .collect(),
            played: self.stories.iter().filter(played).cloned().collect(),
        }
    }

    fn delete_story(&mut self, key: &StoryKey, user: &AuthToken) -> Result<Story, StoreError> {
        let index = self
            .stories
            .iter()
            .position(|story| story.matches(key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if !self.stories[index].is_owned_by(user) {
            tracing::warn!(story = %key, "refusing to delete a story owned by someone else");
            return Err(StoreError::NotOwner(key.to_string()));
        }
        let story = self.stories.remove(index);
        tracing::debug!(id = %story.story_id, "deleted story");
        Ok(story)
    }

    fn record_play(
        &mut self,
        key: &StoryKey,
        player: Option<&AuthToken>,
    ) -> Result<Story, StoreError> {
        let story = self
            .stories
            .iter_mut()
            .find(|story| story.matches(key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if let Some(player) = player {
            if !story.played_by.iter().any(|p| p == player.as_str()) {
                story.played_by.push(player.as_str().to_string());
            }
        }
        Ok(story.clone())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    stories: Vec<Story>,
}

/// A [`MemoryStore`] persisted as one JSON file, rewritten after each change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let stories = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Vec::new(),
            Ok(contents) => {
                let file: StoreFile =
                    serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                file.stories
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self {
            path,
            inner: MemoryStore::from_stories(stories),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stories(&self) -> &[Story] {
        self.inner.stories()
    }

    /// Applies `change` and writes the file. A failed write undoes the change.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let before = self.inner.stories.clone();
        let value = change(&mut self.inner)?;
        if let Err(err) = self.save() {
            self.inner.stories = before;
            return Err(err);
        }
        Ok(value)
    }

    fn save(&self) -> Result<(), StoreError> {
        let file = StoreFile {
            stories: self.inner.stories.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), stories = file.stories.len(), "saved stories");
        Ok(())
    }
}

impl StoryStore for FileStore {
    fn create_story(&mut self, owner: Option<&AuthToken>) -> Result<Story, StoreError> {
        self.commit(|inner| inner.create_story(owner))
    }

    fn update_story(
        &mut self,
        id: StoryId,
        title: &str,
        tokens: &TokenStream,
    ) -> Result<Story, StoreError> {
        self.commit(|inner| inner.update_story(id, title, tokens))
    }

    fn get_story(&self, key: &StoryKey) -> Result<Story, StoreError> {
        self.inner.get_story(key)
    }

    fn list_stories(&self, user: &AuthToken) -> UserStories {
        self.inner.list_stories(user)
    }

    fn delete_story(&mut self, key: &StoryKey, user: &AuthToken) -> Result<Story, StoreError> {
        self.commit(|inner| inner.delete_story(key, user))
    }

    fn record_play(
        &mut self,
        key: &StoryKey,
        player: Option<&AuthToken>,
    ) -> Result<Story, StoreError> {
        if player.is_none() {
            return self.inner.get_story(key);
        }
        self.commit(|inner| inner.record_play(key, player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Token;
    use rand::rngs::mock::StepRng;
    use tempfile::TempDir;

    fn tokens() -> TokenStream {
        TokenStream::new(vec![Token::plain("A "), Token::blank("Thing", None)])
    }

    fn temp_store() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stories.json");
        (dir, path)
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let code = InviteCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), INVITE_CODE_LEN);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn keys_parse_codes_and_ids() {
        assert_eq!(
            StoryKey::parse(" ab12cd "),
            Ok(StoryKey::Code(InviteCode("AB12CD".into())))
        );
        let id = Uuid::new_v4();
        assert_eq!(
            StoryKey::parse(&id.to_string()),
            Ok(StoryKey::Id(StoryId(id)))
        );
        assert_eq!(StoryKey::parse(""), Err(StoryKeyError::Empty));
        assert!(matches!(
            StoryKey::parse("AB-12"),
            Err(StoryKeyError::Unrecognized(_))
        ));
    }

    #[test]
    fn anonymous_create_update_and_lookup() {
        let mut store = MemoryStore::with_rng(StdRng::seed_from_u64(1));
        let created = store.create_story(None).unwrap();
        assert_eq!(created.owner, None);

        let updated = store
            .update_story(created.story_id, "  Picnic ", &tokens())
            .unwrap();
        assert_eq!(updated.title, "Picnic");

        let lower = created.invite_code.as_str().to_ascii_lowercase();
        let by_code = store.get_story(&StoryKey::parse(&lower).unwrap()).unwrap();
        let by_id = store.get_story(&StoryKey::Id(created.story_id)).unwrap();
        assert_eq!(by_code, updated);
        assert_eq!(by_id, updated);
    }

    #[test]
    fn owner_is_recorded_when_signed_in() {
        let mut store = MemoryStore::with_rng(StdRng::seed_from_u64(2));
        let token = AuthToken::new("secret").unwrap();
        let story = store.create_story(Some(&token)).unwrap();
        assert_eq!(story.owner.as_deref(), Some("secret"));
        assert_eq!(AuthToken::new("   "), None);
    }

    #[test]
    fn update_requires_title_and_known_story() {
        let mut store = MemoryStore::with_rng(StdRng::seed_from_u64(3));
        let story = store.create_story(None).unwrap();
        assert!(matches!(
            store.update_story(story.story_id, " ", &tokens()),
            Err(StoreError::TitleMissing)
        ));
        assert!(matches!(
            store.update_story(StoryId::new(), "T", &tokens()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn gives_up_when_codes_keep_colliding() {
        let mut store = MemoryStore::with_rng(StepRng::new(0, 0));
        store.create_story(None).unwrap();
        assert!(matches!(
            store.create_story(None),
            Err(StoreError::CodesExhausted(MAX_CODE_ATTEMPTS))
        ));
    }

    #[test]
    fn file_store_round_trips_through_disk() {
        let (_dir, path) = temp_store();
        let story = {
            let mut store = FileStore::open(&path).unwrap();
            let story = store.create_story(None).unwrap();
            store.update_story(story.story_id, "Zoo", &tokens()).unwrap()
        };

        let reopened = FileStore::open(&path).unwrap();
        let found = reopened
            .get_story(&StoryKey::Code(story.invite_code.clone()))
            .unwrap();
        assert_eq!(found, story);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""inviteCode""#));
        assert!(raw.contains(r#""text": "Thing""#));
    }

    #[test]
    fn listing_splits_created_and_played() {
        let mut store = MemoryStore::with_rng(StdRng::seed_from_u64(4));
        let alice = AuthToken::new("alice").unwrap();
        let bob = AuthToken::new("bob").unwrap();
        let mine = store.create_story(Some(&alice)).unwrap();
        let theirs = store.create_story(Some(&bob)).unwrap();
        store.create_story(None).unwrap();

        let key = StoryKey::Code(theirs.invite_code.clone());
        store.record_play(&key, Some(&alice)).unwrap();
        store.record_play(&key, Some(&alice)).unwrap();
        store.record_play(&key, None).unwrap();

        let listing = store.list_stories(&alice);
        assert_eq!(listing.created.len(), 1);
        assert_eq!(listing.created[0].story_id, mine.story_id);
        assert_eq!(listing.played.len(), 1);
        assert_eq!(listing.played[0].played_by, vec!["alice".to_string()]);
    }

    #[test]
    fn only_the_owner_deletes() {
        let mut store = MemoryStore::with_rng(StdRng::seed_from_u64(5));
        let alice = AuthToken::new("alice").unwrap();
        let bob = AuthToken::new("bob").unwrap();
        let story = store.create_story(Some(&alice)).unwrap();
        let anonymous = store.create_story(None).unwrap();
        let key = StoryKey::Id(story.story_id);

        assert!(matches!(
            store.delete_story(&key, &bob),
            Err(StoreError::NotOwner(_))
        ));
        assert!(matches!(
            store.delete_story(&StoryKey::Id(anonymous.story_id), &bob),
            Err(StoreError::NotOwner(_))
        ));
        assert_eq!(store.delete_story(&key, &alice).unwrap().story_id, story.story_id);
        assert!(matches!(
            store.delete_story(&key, &alice),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.stories().len(), 1);
    }

    #[test]
    fn file_store_persists_deletes_and_plays() {
        let (_dir, path) = temp_store();
        let alice = AuthToken::new("alice").unwrap();
        let (kept, removed) = {
            let mut store = FileStore::open(&path).unwrap();
            let kept = store.create_story(Some(&alice)).unwrap();
            let removed = store.create_story(Some(&alice)).unwrap();
            store
                .record_play(&StoryKey::Id(kept.story_id), Some(&alice))
                .unwrap();
            store
                .delete_story(&StoryKey::Id(removed.story_id), &alice)
                .unwrap();
            (kept, removed)
        };

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.get_story(&StoryKey::Id(removed.story_id)).is_err());
        let listing = reopened.list_stories(&alice);
        assert_eq!(listing.created.len(), 1);
        assert_eq!(listing.played[0].story_id, kept.story_id);
    }

    #[test]
    fn failed_write_rolls_back_the_change() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("gone");
        fs::create_dir(&folder).unwrap();
        let path = folder.join("stories.json");
        let mut store = FileStore::open(&path).unwrap();
        fs::remove_dir(&folder).unwrap();

        assert!(matches!(
            store.create_story(None),
            Err(StoreError::Io { .. })
        ));
        assert!(store.stories().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, path) = temp_store();
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
