/// Base segments between two ad breaks. At the nominal 10s per segment this
/// is one break every two minutes.
pub const DEFAULT_AD_INTERVAL: usize = 12;

/// Splices the whole `ad` run after every `every`-th base segment, including
/// after the last one when it falls on the boundary. Base order is kept as
/// given; the result has `base.len() + ad.len() * (base.len() / every)`
/// entries. An empty ad run or a zero interval returns the base unchanged.
pub fn interleave<T: Clone>(base: &[T], ad: &[T], every: usize) -> Vec<T> {
    if ad.is_empty() || every == 0 {
        return base.to_vec();
    }

    let breaks = base.len() / every;
    let mut out = Vec::with_capacity(base.len() + ad.len() * breaks);
    for (index, segment) in base.iter().enumerate() {
        out.push(segment.clone());
        if (index + 1) % every == 0 {
            out.extend_from_slice(ad);
        }
    }
    out
}
