use serde::{Deserialize, Serialize};

pub type Embedding = Vec<f32>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist_id: String,
    pub album_id: Option<String>,
    pub genre_id: Option<String>,
    pub duration_secs: i64,
    pub tags: Vec<String>,
    pub popularity: i64,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub is_verified: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RankedTrack {
    #[serde(flatten)]
    pub track: Track,
    pub artist: ArtistSummary,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_count: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RankedAlbum {
    pub id: String,
    pub title: String,
    pub artist: ArtistSummary,
    pub created_at: i64,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RankedArtist {
    pub id: String,
    pub name: String,
    pub bio: Option<String>,
    pub is_verified: bool,
    pub genres: Vec<String>,
    pub follower_count: i64,
    pub created_at: i64,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RankedPlaylist {
    pub id: String,
    pub title: String,
    pub owner_id: String,
    pub track_count: i64,
    pub created_at: i64,
    pub score: f64,
}

/// Nearest-neighbour match from the semantic search path.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    /// `1 - cosine distance`; `None` for hits from the text fallback.
    pub similarity: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Advertisement {
    pub id: String,
    pub title: String,
    pub audio_id: String,
    pub is_active: bool,
}

/// Both embeddings of a track, as read by the taste-profile builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackEmbeddings {
    pub meta: Option<Embedding>,
    pub audio: Option<Embedding>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Track => "tracks",
            EntityKind::Album => "albums",
            EntityKind::Artist => "artists",
            EntityKind::Playlist => "playlists",
        }
    }

    pub fn name_column(&self) -> &'static str {
        match self {
            EntityKind::Artist => "name",
            _ => "title",
        }
    }
}

/// Entities whose stored embeddings can be regenerated by a background job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReembedTarget {
    Track,
    TrackAudio,
    Album,
    Artist,
    UserPref,
    UserPlaylist,
}

impl ReembedTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReembedTarget::Track => "track",
            ReembedTarget::TrackAudio => "track_audio",
            ReembedTarget::Album => "album",
            ReembedTarget::Artist => "artist",
            ReembedTarget::UserPref => "user_pref",
            ReembedTarget::UserPlaylist => "user_playlist",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub playlists: usize,
}

pub const MAX_PAGE_LIMIT: usize = 50;
pub const DEFAULT_PAGE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("page must be a positive integer")]
    ZeroPage,
    #[error("limit must be between 1 and {}", MAX_PAGE_LIMIT)]
    LimitOutOfRange,
    #[error("page is too large")]
    OffsetOverflow,
}

/// One-based page of a ranked result set. The offset always fits an SQLite
/// integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    page: usize,
    limit: usize,
    offset: i64,
}

impl Page {
    pub fn new(page: usize, limit: usize) -> Result<Self, PageError> {
        if page == 0 {
            return Err(PageError::ZeroPage);
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(PageError::LimitOutOfRange);
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .and_then(|offset| i64::try_from(offset).ok())
            .ok_or(PageError::OffsetOverflow)?;
        Ok(Self {
            page,
            limit,
            offset,
        })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}
