//! Aggregation of a listener's history into a taste-vector pair.

use crate::catalog_store::{Embedding, TrackEmbeddings};
use serde::{Deserialize, Serialize};

/// A listener's aggregated preference in the meta and audio spaces. Either
/// half may be missing when the listener has no usable history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteVectors {
    pub meta: Option<Embedding>,
    pub audio: Option<Embedding>,
}

impl TasteVectors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_cold(&self) -> bool {
        self.meta_vector().is_none() && self.audio_vector().is_none()
    }

    /// Meta vector, treating an empty vector as absent.
    pub fn meta_vector(&self) -> Option<&[f32]> {
        self.meta.as_deref().filter(|v| !v.is_empty())
    }

    pub fn audio_vector(&self) -> Option<&[f32]> {
        self.audio.as_deref().filter(|v| !v.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TasteProfileSettings {
    pub listened_limit: usize,
    pub recent_listened_limit: usize,
    pub liked_limit: usize,
    pub recent_liked_limit: usize,
    /// Weight multiplier per step back in listening history.
    pub listened_decay: f32,
    pub meta_preference_weight: f32,
    pub meta_listened_weight: f32,
    pub meta_liked_weight: f32,
    pub audio_listened_weight: f32,
    pub audio_liked_weight: f32,
}

impl Default for TasteProfileSettings {
    fn default() -> Self {
        Self {
            listened_limit: 5,
            recent_listened_limit: 2,
            liked_limit: 15,
            recent_liked_limit: 1,
            listened_decay: 0.9,
            meta_preference_weight: 0.30,
            meta_listened_weight: 0.50,
            meta_liked_weight: 0.20,
            audio_listened_weight: 0.70,
            audio_liked_weight: 0.30,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TasteProfileBuilder {
    settings: TasteProfileSettings,
}

impl TasteProfileBuilder {
    pub fn new(settings: TasteProfileSettings) -> Self {
        Self { settings }
    }

    pub fn listened_limit(&self, recent: bool) -> usize {
        if recent {
            self.settings.recent_listened_limit
        } else {
            self.settings.listened_limit
        }
    }

    pub fn liked_limit(&self, recent: bool) -> usize {
        if recent {
            self.settings.recent_liked_limit
        } else {
            self.settings.liked_limit
        }
    }

    /// `listened` and `liked` are most recent first.
    pub fn build(
        &self,
        preference: Option<&[f32]>,
        listened: &[TrackEmbeddings],
        liked: &[TrackEmbeddings],
    ) -> TasteVectors {
        let s = &self.settings;

        let listened_meta = decayed_mean(
            listened.iter().map(|t| t.meta.as_deref()),
            s.listened_decay,
        );
        let listened_audio = decayed_mean(
            listened.iter().map(|t| t.audio.as_deref()),
            s.listened_decay,
        );
        let liked_meta = decayed_mean(liked.iter().map(|t| t.meta.as_deref()), 1.0);
        let liked_audio = decayed_mean(liked.iter().map(|t| t.audio.as_deref()), 1.0);

        let meta = blend(&[
            (preference.filter(|v| !v.is_empty()), s.meta_preference_weight),
            (listened_meta.as_deref(), s.meta_listened_weight),
            (liked_meta.as_deref(), s.meta_liked_weight),
        ]);
        let audio = blend(&[
            (listened_audio.as_deref(), s.audio_listened_weight),
            (liked_audio.as_deref(), s.audio_liked_weight),
        ]);

        TasteVectors { meta, audio }
    }
}

/// Weighted mean where the i-th present vector weighs `decay^i`. Vectors
/// whose dimension differs from the first present one are skipped.
fn decayed_mean<'a>(vectors: impl Iterator<Item = Option<&'a [f32]>>, decay: f32) -> Option<Embedding> {
    let mut sum: Option<Vec<f32>> = None;
    let mut total_weight = 0.0f32;
    let mut weight = 1.0f32;

    for vector in vectors.flatten().filter(|v| !v.is_empty()) {
        match &mut sum {
            None => {
                sum = Some(vector.iter().map(|x| x * weight).collect());
            }
            Some(acc) if acc.len() == vector.len() => {
                for (a, x) in acc.iter_mut().zip(vector) {
                    *a += x * weight;
                }
            }
            Some(_) => continue,
        }
        total_weight += weight;
        weight *= decay;
    }

    let sum = sum?;
    if total_weight <= 0.0 {
        return None;
    }
    Some(sum.into_iter().map(|x| x / total_weight).collect())
}

/// Weighted sum of the present components, with weights rescaled so the
/// present ones keep their relative proportions and sum to one.
fn blend(components: &[(Option<&[f32]>, f32)]) -> Option<Embedding> {
    let dimension = components.iter().find_map(|(v, _)| v.map(|v| v.len()))?;
    let present: Vec<(&[f32], f32)> = components
        .iter()
        .filter_map(|(v, w)| v.filter(|v| v.len() == dimension).map(|v| (v, *w)))
        .filter(|(_, w)| *w > 0.0)
        .collect();

    let total: f32 = present.iter().map(|(_, w)| w).sum();
    if present.is_empty() || total <= 0.0 {
        return None;
    }

    let mut out = vec![0.0f32; dimension];
    for (vector, weight) in present {
        let share = weight / total;
        for (o, x) in out.iter_mut().zip(vector) {
            *o += x * share;
        }
    }
    Some(out)
}
