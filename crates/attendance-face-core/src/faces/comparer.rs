use std::cmp::Ordering;

/// Euclidean distance at or below which two encodings belong to the same
/// person.
pub const DEFAULT_MATCH_TOLERANCE: f64 = 0.6;

pub fn face_distance(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum::<f64>()
        .sqrt()
}

/// Pairwise match flags of `candidate` against every known encoding, in the
/// order of `known`.
pub fn compare_faces(known: &[Vec<f64>], candidate: &[f64], tolerance: f64) -> Vec<bool> {
    known
        .iter()
        .map(|entry| entry.len() == candidate.len() && face_distance(entry, candidate) <= tolerance)
        .collect()
}

/// Index and distance of the nearest known encoding, if any.
pub fn closest_match(known: &[Vec<f64>], candidate: &[f64]) -> Option<(usize, f64)> {
    known
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.len() == candidate.len())
        .map(|(idx, entry)| (idx, face_distance(entry, candidate)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert!((face_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-12);
        assert_eq!(face_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn tolerance_boundary_counts_as_match() {
        let known = vec![vec![0.0, 0.0], vec![0.5, 0.0], vec![0.51, 0.0]];
        let flags = compare_faces(&known, &[0.0, 0.0], 0.5);
        assert_eq!(flags, vec![true, true, false]);

        let known = vec![vec![0.59, 0.0], vec![0.61, 0.0]];
        let flags = compare_faces(&known, &[0.0, 0.0], DEFAULT_MATCH_TOLERANCE);
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn mismatched_lengths_never_match() {
        let known = vec![vec![0.0, 0.0, 0.0]];
        assert_eq!(compare_faces(&known, &[0.0, 0.0], 10.0), vec![false]);
        assert!(closest_match(&known, &[0.0, 0.0]).is_none());
    }

    #[test]
    fn closest_match_picks_smallest_distance() {
        let known = vec![vec![1.0, 0.0], vec![0.1, 0.0], vec![-1.0, 0.0]];
        let (idx, distance) = closest_match(&known, &[0.0, 0.0]).unwrap();
        assert_eq!(idx, 1);
        assert!((distance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn empty_known_set_yields_no_flags() {
        assert!(compare_faces(&[], &[0.0], DEFAULT_MATCH_TOLERANCE).is_empty());
        assert!(closest_match(&[], &[0.0]).is_none());
    }
}
