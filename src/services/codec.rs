//! Conversion between caller vectors and the stored unit-vector form.

use pgvector::Vector;

use crate::error::VectorStoreError;

/// Scale `vector` to unit Euclidean length.
///
/// Returns a copy. The zero vector is returned unchanged.
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let squared_sum: f64 = vector.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    let magnitude = squared_sum.sqrt();

    if magnitude > 0.0 {
        let multiplier = 1.0 / magnitude;
        vector
            .iter()
            .map(|&v| (f64::from(v) * multiplier) as f32)
            .collect()
    } else {
        vector.to_vec()
    }
}

/// Euclidean magnitude.
pub fn magnitude(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt()
}

/// Cosine distance in `[0, 2]`, matching pgvector's `<=>` operator.
///
/// Returns `NaN` when either side is the zero vector.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return f64::NAN;
    }
    (1.0 - dot / denom).clamp(0.0, 2.0)
}

/// Narrow double-precision values to `f32`.
///
/// This is lossy: each component is rounded to the nearest `f32`, and values
/// outside the `f32` range become infinite.
pub fn narrow_to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Encodes vectors for one table of fixed dimension.
#[derive(Debug, Clone, Copy)]
pub struct VectorCodec {
    dimensions: usize,
}

impl VectorCodec {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Normalize and convert to the pgvector representation.
    ///
    /// pgvector rejects non-finite components, so they fail here rather than
    /// at the database.
    pub fn to_storage_form(&self, vector: &[f32]) -> Result<Vector, VectorStoreError> {
        self.check(vector)?;
        let normalized = normalize(vector);
        if let Some(pos) = normalized.iter().position(|v| !v.is_finite()) {
            return Err(VectorStoreError::Codec(format!(
                "component {pos} is not finite after normalization"
            )));
        }
        Ok(Vector::from(normalized))
    }

    /// Convert a stored vector back to a numeric array.
    ///
    /// pgvector stores single-precision values, so this path is lossless.
    pub fn to_numeric_array(&self, stored: Vector) -> Result<Vec<f32>, VectorStoreError> {
        let values = stored.to_vec();
        if values.len() != self.dimensions {
            return Err(VectorStoreError::Codec(format!(
                "stored vector has dimension {}, expected {}",
                values.len(),
                self.dimensions
            )));
        }
        Ok(values)
    }

    fn check(&self, vector: &[f32]) -> Result<(), VectorStoreError> {
        if vector.len() != self.dimensions {
            return Err(VectorStoreError::Codec(format!(
                "vector has dimension {}, expected {}",
                vector.len(),
                self.dimensions
            )));
        }
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(VectorStoreError::Codec(format!(
                "component {pos} is not finite"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-5;

    #[test]
    fn test_normalize_unit_length() {
        let cases: [Vec<f32>; 5] = [
            vec![3.0, 4.0],
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![-2.5, 7.0, 1e-3, 42.0],
            vec![1e-20, 0.0],
        ];
        for v in cases {
            let n = normalize(&v);
            assert!((magnitude(&n) - 1.0).abs() < EPS, "{v:?} -> {n:?}");
        }
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let zero = vec![0.0f32; 4];
        assert_eq!(normalize(&zero), zero);
    }

    #[test]
    fn test_normalize_does_not_mutate_input() {
        let v = vec![3.0f32, 4.0];
        let n = normalize(&v);
        assert_eq!(v, vec![3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < EPS);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < EPS);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < EPS);
        assert!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).is_nan());
    }

    #[test]
    fn test_to_storage_form_normalizes() {
        let codec = VectorCodec::new(2);
        let stored = codec.to_storage_form(&[3.0, 4.0]).unwrap();
        let values = codec.to_numeric_array(stored).unwrap();
        assert!((magnitude(&values) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_to_storage_form_rejects_bad_input() {
        let codec = VectorCodec::new(3);
        assert!(matches!(
            codec.to_storage_form(&[1.0, 2.0]),
            Err(VectorStoreError::Codec(_))
        ));
        assert!(matches!(
            codec.to_storage_form(&[1.0, f32::NAN, 0.0]),
            Err(VectorStoreError::Codec(_))
        ));
        assert!(matches!(
            codec.to_numeric_array(Vector::from(vec![1.0])),
            Err(VectorStoreError::Codec(_))
        ));
    }

    #[test]
    fn test_narrow_to_f32() {
        let narrowed = narrow_to_f32(&[0.1, 1e300]);
        assert_eq!(narrowed[0], 0.1f32);
        assert!(narrowed[1].is_infinite());
    }
}
