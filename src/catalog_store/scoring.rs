//! Composable ranking expressions.
//!
//! A [`ScoreExpr`] is a weighted sum of [`ScoreTerm`]s which the store renders
//! into SQL. Vectors, weights and caps are always bound as parameters; only
//! whitelisted column names ever reach the SQL text.

use super::vector_functions::encode_embedding;
use rusqlite::types::Value;

/// Embedding columns that may be scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingColumn {
    Meta,
    Audio,
}

impl EmbeddingColumn {
    pub fn column(&self) -> &'static str {
        match self {
            EmbeddingColumn::Meta => "meta_embedding",
            EmbeddingColumn::Audio => "audio_embedding",
        }
    }
}

/// Raw counters a popularity term can be computed from. Each one is exposed
/// as a named column by the candidate subquery of the entities supporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularitySignal {
    /// Plays inside the query's recent-plays window (tracks).
    RecentPlays,
    /// Followers (artists).
    Followers,
    /// Likes on member tracks (playlists).
    MemberLikes,
    /// Plays of member tracks (playlists).
    MemberPlays,
}

impl PopularitySignal {
    pub fn column(&self) -> &'static str {
        match self {
            PopularitySignal::RecentPlays => "recent_play_count",
            PopularitySignal::Followers => "follower_count",
            PopularitySignal::MemberLikes => "member_like_count",
            PopularitySignal::MemberPlays => "member_play_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreTerm {
    /// `weight * (1 - cosine_distance(column, vector))`, contributing 0 for
    /// rows without a usable embedding.
    Similarity {
        column: EmbeddingColumn,
        vector: Vec<f32>,
        weight: f64,
    },
    /// `weight * min(log10(1 + signal), cap)`.
    Popularity {
        signal: PopularitySignal,
        cap: f64,
        weight: f64,
    },
    Constant {
        weight: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreExpr {
    terms: Vec<ScoreTerm>,
}

impl ScoreExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(weight: f64) -> Self {
        Self::new().with(ScoreTerm::Constant { weight })
    }

    pub fn with(mut self, term: ScoreTerm) -> Self {
        self.terms.push(term);
        self
    }

    /// Adds a similarity term when a vector is available.
    pub fn with_similarity(
        self,
        column: EmbeddingColumn,
        vector: Option<&[f32]>,
        weight: f64,
    ) -> Self {
        match vector {
            Some(v) if !v.is_empty() => self.with(ScoreTerm::Similarity {
                column,
                vector: v.to_vec(),
                weight,
            }),
            _ => self,
        }
    }

    pub fn terms(&self) -> &[ScoreTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn uses_column(&self, column: EmbeddingColumn) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t, ScoreTerm::Similarity { column: c, .. } if *c == column))
    }

    pub fn uses_signal(&self, signal: PopularitySignal) -> bool {
        self.terms
            .iter()
            .any(|t| matches!(t, ScoreTerm::Popularity { signal: s, .. } if *s == signal))
    }

    /// Renders the expression against a candidate row exposing the term
    /// columns under their plain names.
    pub fn render(&self, binds: &mut SqlBinds) -> String {
        if self.terms.is_empty() {
            return "0.0".to_string();
        }
        self.terms
            .iter()
            .map(|term| match term {
                ScoreTerm::Similarity {
                    column,
                    vector,
                    weight,
                } => {
                    let v = binds.push_vector(vector);
                    let w = binds.push(*weight);
                    format!(
                        "(COALESCE(1.0 - cosine_distance({}, {}), 0.0) * {})",
                        column.column(),
                        v,
                        w
                    )
                }
                ScoreTerm::Popularity {
                    signal,
                    cap,
                    weight,
                } => {
                    let c = binds.push(*cap);
                    let w = binds.push(*weight);
                    format!(
                        "(MIN(COALESCE(log_damp({}), 0.0), {}) * {})",
                        signal.column(),
                        c,
                        w
                    )
                }
                ScoreTerm::Constant { weight } => format!("({})", binds.push(*weight)),
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Positional parameters accumulated while rendering a query.
#[derive(Debug, Default)]
pub struct SqlBinds {
    values: Vec<Value>,
}

impl SqlBinds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value and returns its `?N` placeholder.
    pub fn push(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("?{}", self.values.len())
    }

    pub fn push_vector(&mut self, vector: &[f32]) -> String {
        self.push(Value::Blob(encode_embedding(vector)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
