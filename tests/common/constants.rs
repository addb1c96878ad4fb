//! Shared constants for end-to-end tests
//!
//! When the seeded catalog changes, update only this file and `fixtures.rs`.
#![allow(dead_code)]

// ============================================================================
// Listeners
// ============================================================================

pub const LISTENER_1_ID: &str = "listener-1";
pub const LISTENER_2_ID: &str = "listener-2";

/// Listener with a stored piano preference who also liked `PIANO_TRACK_ID`.
pub const PIANO_FAN_ID: &str = "piano-fan";

/// Listener with a stored jazz preference and no history, so only a meta taste.
pub const PREFERENCE_ONLY_ID: &str = "preference-only";

/// Listener following the jazz artist.
pub const JAZZ_FAN_ID: &str = "jazz-fan";

// ============================================================================
// Catalog IDs
// ============================================================================

/// "The Test Band", no embeddings.
pub const ARTIST_1_ID: &str = "artist-1";

/// "Jazz Ensemble", followed by `JAZZ_FAN_ID`.
pub const ARTIST_2_ID: &str = "artist-2";

pub const ALBUM_1_ID: &str = "album-1";
pub const ALBUM_2_ID: &str = "album-2";

/// Fully transcoded, 30 music segments.
pub const TRACK_1_ID: &str = "track-1";

/// Fully transcoded, 5 timed segments.
pub const TRACK_2_ID: &str = "track-2";

/// Meta embedding along the "piano" axis.
pub const PIANO_TRACK_ID: &str = "piano-1";

/// Meta embedding close to the "piano" axis.
pub const PIANO_TRACK_2_ID: &str = "piano-2";

/// Meta embedding along the "jazz" axis, by the jazz artist.
pub const JAZZ_TRACK_ID: &str = "jazz-1";

/// Exists in the catalog but the media service has no segments for it yet.
pub const UNPROCESSED_TRACK_ID: &str = "track-unprocessed";

pub const PLAYLIST_1_ID: &str = "playlist-1";

// ============================================================================
// Advertisements
// ============================================================================

pub const AD_1_ID: &str = "ad-1";
pub const AD_1_AUDIO_ID: &str = "ad-audio-1";

/// Present in the catalog but switched off.
pub const INACTIVE_AD_ID: &str = "ad-off";

// ============================================================================
// Media service
// ============================================================================

pub const TRACK_1_SEGMENTS: usize = 30;
pub const TRACK_2_SEGMENTS: usize = 5;
pub const AD_SEGMENTS: usize = 2;

/// Duration reported for every segment of `TRACK_2_ID`.
pub const TRACK_2_SEGMENT_SECS: f64 = 9.5;

/// Base segments between two ad breaks.
pub const AD_INTERVAL: usize = 12;

// ============================================================================
// Embedding space
// ============================================================================

/// Query text the fake embedder maps onto the piano axis.
pub const PIANO_QUERY: &str = "calm piano";

/// Query text the fake embedder maps onto the jazz axis.
pub const JAZZ_QUERY: &str = "late night jazz";

pub const PIANO_AXIS: [f32; 3] = [1.0, 0.0, 0.0];
pub const JAZZ_AXIS: [f32; 3] = [0.0, 1.0, 0.0];
pub const OTHER_AXIS: [f32; 3] = [0.0, 0.0, 1.0];

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for HTTP requests in tests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum time to wait for server to be ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
