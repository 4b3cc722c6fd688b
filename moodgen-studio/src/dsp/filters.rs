//! Sample-domain helpers: pre-emphasis and weighted blending

use super::DspError;

/// Pre-emphasis coefficient applied to the harmonic layer
pub const PRE_EMPHASIS_COEF: f32 = 0.95;

/// First-order high-pass `y[n] = x[n] - coef * x[n-1]`, with `y[0] = x[0]`
pub fn pre_emphasis(samples: &[f32], coef: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    let mut prev = None;
    for &x in samples {
        out.push(match prev {
            Some(p) => x - coef * p,
            None => x,
        });
        prev = Some(x);
    }
    out
}

/// `base_weight * base + layer_weight * layer`, element-wise.
///
/// Both inputs must have the same length.
pub fn blend(base: &[f32], base_weight: f32, layer: &[f32], layer_weight: f32) -> Result<Vec<f32>, DspError> {
    if base.len() != layer.len() {
        return Err(DspError::LengthMismatch {
            expected: base.len(),
            actual: layer.len(),
        });
    }
    Ok(base
        .iter()
        .zip(layer)
        .map(|(b, l)| base_weight * b + layer_weight * l)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_emphasis() {
        let y = pre_emphasis(&[1.0, 1.0, 0.0], 0.95);
        assert_eq!(y.len(), 3);
        assert!((y[0] - 1.0).abs() < 1e-6);
        assert!((y[1] - 0.05).abs() < 1e-6);
        assert!((y[2] + 0.95).abs() < 1e-6);
        assert!(pre_emphasis(&[], 0.95).is_empty());
    }

    #[test]
    fn test_blend() {
        let out = blend(&[1.0, 0.0], 0.6, &[0.0, 1.0], 0.4).unwrap();
        assert_eq!(out, vec![0.6, 0.4]);
        assert_eq!(
            blend(&[1.0], 0.5, &[1.0, 2.0], 0.5),
            Err(DspError::LengthMismatch { expected: 1, actual: 2 })
        );
    }
}
