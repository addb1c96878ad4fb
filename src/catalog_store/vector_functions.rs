//! Embedding encoding and the vector operators registered on every catalog
//! connection.
//!
//! Embeddings are stored as little-endian `f32` blobs. The SQL operators
//! mirror the usual vector-database trio:
//!
//! | SQL function              | operator | meaning                    |
//! |---------------------------|----------|----------------------------|
//! | `l2_distance(a, b)`       | `<->`    | euclidean distance         |
//! | `cosine_distance(a, b)`   | `<=>`    | `1 - cosine similarity`    |
//! | `neg_inner_product(a, b)` | `<#>`    | negated dot product        |
//!
//! Every operator yields NULL instead of failing when an input is NULL,
//! malformed, zero-norm or of a different dimension, so a row without an
//! embedding never aborts a ranking query.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes a stored embedding. Returns `None` for empty, truncated or
/// non-finite blobs.
pub fn decode_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.is_empty() || blob.len() % 4 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return None;
        }
        out.push(value);
    }
    Some(out)
}

fn dot_and_norms(a: &[f32], b: &[f32]) -> Option<(f64, f64, f64)> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    Some((dot, norm_a, norm_b))
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    let (dot, norm_a, norm_b) = dot_and_norms(a, b)?;
    // sqrt of the product keeps identical vectors at exactly 1.0
    let denom = (norm_a * norm_b).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    cosine_similarity(a, b).map(|s| (1.0 - s).clamp(0.0, 2.0))
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    Some(sum.sqrt())
}

pub fn neg_inner_product(a: &[f32], b: &[f32]) -> Option<f64> {
    dot_and_norms(a, b).map(|(dot, _, _)| -dot)
}

/// `log10(1 + max(x, 0))`, the damping applied to raw popularity counters.
pub fn log_damp(x: f64) -> f64 {
    x.max(0.0).ln_1p() / std::f64::consts::LN_10
}

fn embedding_arg(ctx: &Context<'_>, idx: usize) -> Option<Vec<f32>> {
    match ctx.get_raw(idx) {
        ValueRef::Blob(bytes) => decode_embedding(bytes),
        _ => None,
    }
}

fn binary_vector_op(ctx: &Context<'_>, op: fn(&[f32], &[f32]) -> Option<f64>) -> Option<f64> {
    let a = embedding_arg(ctx, 0)?;
    let b = embedding_arg(ctx, 1)?;
    op(&a, &b)
}

pub fn register_vector_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("cosine_distance", 2, flags, |ctx| {
        Ok(binary_vector_op(ctx, cosine_distance))
    })?;
    conn.create_scalar_function("l2_distance", 2, flags, |ctx| {
        Ok(binary_vector_op(ctx, l2_distance))
    })?;
    conn.create_scalar_function("neg_inner_product", 2, flags, |ctx| {
        Ok(binary_vector_op(ctx, neg_inner_product))
    })?;
    conn.create_scalar_function("log_damp", 1, flags, |ctx| {
        let value: Option<f64> = ctx.get(0)?;
        Ok(value.map(log_damp))
    })?;
    Ok(())
}
