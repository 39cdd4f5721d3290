//! Vector similarity functions.
//!
//! Pure Rust implementations without external dependencies.

/// Calculate cosine similarity between two vectors.
///
/// Returns a value in [-1.0, 1.0] where 1.0 = identical direction.
/// Mismatched dimensions and zero vectors yield 0.0 rather than
/// panicking; embeddings arrive from an external service and are not
/// trusted to be well-formed.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Calculate the centroid (mean vector) of multiple embeddings.
///
/// Returns None when the input is empty or dimensions disagree.
pub fn centroid(embeddings: &[&[f32]]) -> Option<Vec<f32>> {
    let first = embeddings.first()?;
    let dim = first.len();
    if embeddings.iter().any(|e| e.len() != dim) {
        return None;
    }

    let n = embeddings.len() as f32;
    let mut mean = vec![0.0f32; dim];
    for embedding in embeddings {
        for (i, &val) in embedding.iter().enumerate() {
            mean[i] += val;
        }
    }
    for val in mean.iter_mut() {
        *val /= n;
    }

    Some(mean)
}

/// Mean pairwise cosine similarity over a bounded sample of embeddings.
///
/// Used as a cluster confidence measure. A sample of fewer than two
/// vectors has no pairs; that degenerate case scores 0.5 (neutral).
pub fn mean_pairwise_similarity(embeddings: &[&[f32]], sample_size: usize) -> f32 {
    let sample = &embeddings[..embeddings.len().min(sample_size)];
    if sample.len() < 2 {
        return 0.5;
    }

    let mut total = 0.0f32;
    let mut pairs = 0usize;
    for i in 0..sample.len() {
        for j in (i + 1)..sample.len() {
            total += cosine_similarity(sample[i], sample[j]);
            pairs += 1;
        }
    }

    total / pairs as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_centroid_is_mean() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let c = centroid(&[&a, &b]).unwrap();
        assert!((c[0] - 0.5).abs() < 0.001);
        assert!((c[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_centroid_empty_and_ragged() {
        assert!(centroid(&[]).is_none());
        let a = [1.0, 0.0];
        let b = [1.0];
        assert!(centroid(&[&a[..], &b[..]]).is_none());
    }

    #[test]
    fn test_mean_pairwise_similarity() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        // pairs: (a,b)=1, (a,c)=0, (b,c)=0 -> mean 1/3
        let sim = mean_pairwise_similarity(&[&a, &b, &c], 10);
        assert!((sim - 1.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_mean_pairwise_similarity_sample_bound() {
        let a = [1.0, 0.0];
        let c = [0.0, 1.0];
        // Sample of 2 ignores the dissimilar third vector
        let sim = mean_pairwise_similarity(&[&a, &a, &c], 2);
        assert!((sim - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mean_pairwise_similarity_single() {
        let a = [1.0, 0.0];
        assert!((mean_pairwise_similarity(&[&a], 10) - 0.5).abs() < 0.001);
    }
}
