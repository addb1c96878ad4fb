//! HLS media playlist rendering.

use super::SignedSegment;
use std::fmt::Write;

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Duration assumed for segments the signer did not time.
pub const NOMINAL_SEGMENT_SECS: f64 = 10.0;

/// Renders a VOD media playlist. `#EXT-X-TARGETDURATION` is the longest
/// segment rounded up, so an untimed list renders exactly as
/// `#EXT-X-TARGETDURATION:10` with `#EXTINF:10.0,` lines.
pub fn render_manifest(segments: &[SignedSegment], nominal_secs: f64) -> String {
    let durations: Vec<f64> = segments
        .iter()
        .map(|s| s.duration_secs().unwrap_or(nominal_secs))
        .collect();
    let target = durations
        .iter()
        .cloned()
        .fold(nominal_secs, f64::max)
        .ceil() as u64;

    let mut out = String::with_capacity(64 + segments.len() * 96);
    out.push_str("#EXTM3U\n#EXT-X-VERSION:3\n");
    let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", target);
    out.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
    for (segment, duration) in segments.iter().zip(durations) {
        let _ = writeln!(out, "#EXTINF:{},", format_duration(duration));
        out.push_str(segment.url());
        out.push('\n');
    }
    out.push_str("#EXT-X-ENDLIST\n");
    out
}

/// At least one decimal, at most three: `10.0`, `4.5`, `9.876`.
fn format_duration(secs: f64) -> String {
    let formatted = format!("{:.3}", secs);
    let trimmed = formatted.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}
