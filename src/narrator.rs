//! Story narration
//!
//! Splits a generated story into sentence-sized chunks and hands them out one
//! at a time. The narrator never starts playback itself: the session calls
//! [`StoryNarrator::advance`] each time the previous chunk finishes playing.

/// Sentence terminators
const TERMINATORS: [char; 3] = ['.', '!', '?'];

fn is_terminator(c: char) -> bool {
    TERMINATORS.contains(&c)
}

/// Split a story into playable chunks
///
/// Each chunk ends with its run of terminators (`"Что?!"` stays whole) and
/// keeps the whitespace that preceded it. Text without any terminator is a
/// single chunk; a trailing fragment without a terminator becomes the last
/// chunk. Input with nothing to say yields `[fallback]`.
#[must_use]
pub fn segment(story: &str, fallback: &str) -> Vec<String> {
    if story.trim().is_empty() {
        return vec![fallback.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut chars = story.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if is_terminator(c) {
            while let Some(&next) = chars.peek() {
                if !is_terminator(next) {
                    break;
                }
                current.push(next);
                chars.next();
            }
            push_chunk(&mut chunks, std::mem::take(&mut current));
        }
    }
    push_chunk(&mut chunks, current);

    // Punctuation-only input has nothing to say
    if chunks.is_empty() {
        chunks.push(fallback.to_string());
    }

    chunks
}

/// Keep chunks that contain something to say
fn push_chunk(chunks: &mut Vec<String>, chunk: String) {
    if chunk
        .chars()
        .any(|c| !c.is_whitespace() && !is_terminator(c))
    {
        chunks.push(chunk);
    }
}

/// Chunks of the story being narrated and the playback cursor
///
/// Invariant: `next_index <= chunks.len()`. Empty `chunks` means no story.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryPlaybackState {
    /// Chunks in playback order
    pub chunks: Vec<String>,
    /// Index of the next chunk to hand out
    pub next_index: usize,
}

impl StoryPlaybackState {
    /// Whether a story is being narrated
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.chunks.is_empty()
    }
}

/// Result of [`StoryNarrator::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Next chunk to play
    Chunk(String),
    /// Every chunk has been handed out; the narrator has reset
    Finished,
}

/// Sequences story chunks with pause/resume
#[derive(Debug, Default)]
pub struct StoryNarrator {
    state: StoryPlaybackState,
    paused: bool,
}

impl StoryNarrator {
    /// Create an idle narrator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new story, replacing any current one
    pub fn load(&mut self, chunks: Vec<String>) {
        tracing::debug!(chunks = chunks.len(), "story loaded");
        self.state = StoryPlaybackState {
            chunks,
            next_index: 0,
        };
        self.paused = false;
    }

    /// Hand out the next chunk
    ///
    /// Returns [`Advance::Finished`] once the cursor reaches the end and
    /// resets; calling again after that keeps returning `Finished`.
    pub fn advance(&mut self) -> Advance {
        match self.state.chunks.get(self.state.next_index) {
            Some(chunk) => {
                let chunk = chunk.clone();
                self.state.next_index += 1;
                tracing::trace!(
                    index = self.state.next_index,
                    total = self.state.chunks.len(),
                    "story chunk"
                );
                Advance::Chunk(chunk)
            }
            None => {
                if self.is_active() {
                    tracing::debug!("story finished");
                }
                self.reset();
                Advance::Finished
            }
        }
    }

    /// Stop continuation after the current chunk; no-op without a story
    pub fn pause(&mut self) {
        if self.is_active() {
            self.paused = true;
        }
    }

    /// Allow continuation again
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Drop the current story
    pub fn reset(&mut self) {
        self.state = StoryPlaybackState::default();
        self.paused = false;
    }

    /// Whether a story is being narrated
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether continuation is gated off
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Chunk most recently handed out
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.state
            .next_index
            .checked_sub(1)
            .and_then(|i| self.state.chunks.get(i))
            .map(String::as_str)
    }

    /// Snapshot of chunks and cursor
    #[must_use]
    pub const fn state(&self) -> &StoryPlaybackState {
        &self.state
    }
}
