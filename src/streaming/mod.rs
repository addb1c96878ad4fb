//! Ad-stitched HLS delivery over cached, signed segment lists.

mod ad_selector;
mod assembler;
mod interleave;
mod manifest;
mod play_history;
pub(crate) mod playlist_cache;
mod retry_policy;
mod signer;

pub use ad_selector::{AdContext, AdSelector, NoAds, RotatingAdSelector, StaticAdSelector};
pub use assembler::{
    ad_manifest_path, track_manifest_path, AssemblerSettings, Listener, StreamAssembler,
    StreamError, StreamInfo,
};
pub use interleave::{interleave, DEFAULT_AD_INTERVAL};
pub use manifest::{render_manifest, MANIFEST_CONTENT_TYPE, NOMINAL_SEGMENT_SECS};
pub use play_history::{PlayRecorder, PlayRecordingMode, PlayRecordingPolicy};
pub use playlist_cache::{
    cache_key, PlaylistCache, PlaylistTtl, PLAYLIST_CACHE_TTL_SECS, SIGNED_URL_EXPIRY_SECS,
};
pub use retry_policy::RetryPolicy;
pub use signer::{HttpSegmentSigner, SegmentKind, SegmentSigner, SignedSegment, SignerError};

const MAX_ID_LEN: usize = 64;

/// Ids are 1-64 characters of `[A-Za-z0-9_-]`. UUIDs qualify.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
