//! Episode and chapter metadata consumed by the playback core.

use bridge_traits::audio::MediaSource;
use std::time::Duration;

/// A podcast episode handed to the player.
///
/// The id is opaque to the core; it only flows through events and the
/// position store. Duration may be absent when the feed did not declare
/// one, in which case the backend-reported duration (or the configured
/// fallback) is used.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Opaque episode identifier.
    pub id: String,
    /// Where the audio comes from. `None` means the episode is not playable.
    pub source: Option<MediaSource>,
    /// Declared duration, if known.
    pub duration: Option<Duration>,
    /// Chapter markers, sorted by start time.
    pub chapters: Vec<Chapter>,
}

impl Episode {
    /// Create an episode with a source and no chapters.
    pub fn new(id: impl Into<String>, source: MediaSource) -> Self {
        Self {
            id: id.into(),
            source: Some(source),
            duration: None,
            chapters: Vec::new(),
        }
    }

    /// Create an episode without a playable source.
    ///
    /// Playing it fails immediately with a non-recoverable error.
    pub fn without_source(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
            duration: None,
            chapters: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    /// Index of the chapter containing `position`, if any.
    ///
    /// Chapters are half-open `[start, end)`; positions past the last
    /// chapter's end belong to no chapter.
    pub fn chapter_at(&self, position: Duration) -> Option<usize> {
        if self.chapters.is_empty() {
            return None;
        }
        let idx = match self
            .chapters
            .binary_search_by(|chapter| chapter.start.cmp(&position))
        {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(idx) => idx - 1,
        };
        let chapter = &self.chapters[idx];
        (position < chapter.end).then_some(idx)
    }
}

/// A chapter marker within an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Opaque chapter identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Start offset within the episode, inclusive.
    pub start: Duration,
    /// End offset within the episode, exclusive.
    pub end: Duration,
}

impl Chapter {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: Duration,
        end: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
        }
    }
}
