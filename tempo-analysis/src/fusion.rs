//! Combining the spectral and autocorrelation estimates

/// Fuse the two tempo candidates into one BPM value
///
/// Candidates closer than `threshold` BPM corroborate each other and are
/// averaged. Otherwise the autocorrelation candidate wins: the finite-length
/// FFT is the estimator more prone to half/double tempo confusion.
/// A difference of exactly `threshold` counts as disagreement.
pub fn fuse(spectral_bpm: f32, periodicity_bpm: f32, threshold: f32) -> f32 {
    if (spectral_bpm - periodicity_bpm).abs() < threshold {
        (spectral_bpm + periodicity_bpm) / 2.0
    } else {
        periodicity_bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_estimates_are_averaged() {
        assert!((fuse(120.0, 122.0, 5.0) - 121.0).abs() < 1e-6);
    }

    #[test]
    fn test_averaging_is_symmetric() {
        for (f, a) in [(120.0, 122.0), (87.3, 90.1), (150.0, 146.5)] {
            assert_eq!(fuse(f, a, 5.0), fuse(a, f, 5.0));
        }
    }

    #[test]
    fn test_disagreement_prefers_autocorrelation() {
        assert_eq!(fuse(100.0, 130.0, 5.0), 130.0);
        assert_eq!(fuse(130.0, 100.0, 5.0), 100.0);
    }

    #[test]
    fn test_threshold_boundary() {
        // Just inside: averaged
        let inside = fuse(100.0, 104.999, 5.0);
        assert!((inside - 102.4995).abs() < 1e-3);

        // Exactly at the threshold: autocorrelation only
        assert_eq!(fuse(100.0, 105.0, 5.0), 105.0);
        assert_eq!(fuse(105.0, 100.0, 5.0), 100.0);
    }

    #[test]
    fn test_threshold_is_tunable() {
        assert_eq!(fuse(100.0, 110.0, 5.0), 110.0);
        assert!((fuse(100.0, 110.0, 20.0) - 105.0).abs() < 1e-6);
        // Zero threshold never averages
        assert_eq!(fuse(120.0, 120.0, 0.0), 120.0);
    }
}
