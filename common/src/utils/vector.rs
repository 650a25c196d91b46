/// Cosine similarity of two embedding vectors.
///
/// Dimension mismatches and zero-magnitude vectors are data warnings in
/// this system, so both return 0 rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Component-wise mean of a set of vectors. Vectors whose length differs
/// from the first one are skipped as dimension mismatches. Returns `None`
/// when no usable vector remains.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dimension = vectors.first()?.len();
    if dimension == 0 {
        return None;
    }

    let mut sums = vec![0.0f64; dimension];
    let mut count = 0usize;
    for vector in vectors {
        if vector.len() != dimension {
            tracing::warn!(
                expected = dimension,
                actual = vector.len(),
                "skipping vector with mismatched dimension in mean"
            );
            continue;
        }
        for (slot, value) in sums.iter_mut().zip(vector.iter()) {
            *slot += f64::from(*value);
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    Some(
        sums.into_iter()
            .map(|sum| (sum / count as f64) as f32)
            .collect(),
    )
}
