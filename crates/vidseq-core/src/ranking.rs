use std::fmt::Write;

/// Top `n` `(label, score)` pairs in descending score order.
///
/// Scores are paired with labels by position. Equal scores keep their input
/// relative order. NaN scores rank below everything else. Ranking stops at the
/// first zero or NaN score, so fewer than `n` entries may come back.
pub fn top_predictions<'a, S: AsRef<str>>(
    predictions: &[f32],
    vocabulary: &'a [S],
    n: usize,
) -> Vec<(&'a str, f32)> {
    let mut ranked: Vec<(&'a str, f32)> = vocabulary
        .iter()
        .map(AsRef::as_ref)
        .zip(predictions.iter().copied())
        .collect();
    ranked.sort_by(|a, b| rank_key(b.1).total_cmp(&rank_key(a.1)));

    ranked
        .into_iter()
        .take(n)
        .take_while(|(_, score)| *score != 0.0 && !score.is_nan())
        .collect()
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Renders ranked predictions one per line as `label: 0.90`.
pub fn format_predictions(ranked: &[(&str, f32)]) -> String {
    let mut out = String::new();
    for (label, score) in ranked {
        let _ = writeln!(out, "{label}: {score:.2}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_first_zero() {
        let vocab = ["a", "b", "c", "d"];
        let top = top_predictions(&[0.9, 0.1, 0.0, 0.0], &vocab, 5);
        assert_eq!(top, vec![("a", 0.9), ("b", 0.1)]);
    }

    #[test]
    fn sorts_descending_and_limits() {
        let vocab = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let top = top_predictions(&[0.2, 0.5, 0.3], &vocab, 2);
        assert_eq!(top, vec![("b", 0.5), ("c", 0.3)]);
    }

    #[test]
    fn ties_keep_vocabulary_order() {
        let vocab = ["x", "y", "z"];
        let top = top_predictions(&[0.25, 0.5, 0.25], &vocab, 3);
        assert_eq!(top, vec![("y", 0.5), ("x", 0.25), ("z", 0.25)]);
    }

    #[test]
    fn nan_scores_rank_last() {
        let vocab: Vec<String> = (0..64).map(|i| format!("c{i}")).collect();
        let preds: Vec<f32> = (0..64)
            .map(|i| if i % 3 == 0 { f32::NAN } else { i as f32 / 100.0 })
            .collect();
        let top = top_predictions(&preds, &vocab, 5);
        let labels: Vec<&str> = top.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["c62", "c61", "c59", "c58", "c56"]);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn all_nan_is_empty() {
        let vocab: Vec<String> = (0..30).map(|i| format!("c{i}")).collect();
        assert!(top_predictions(&[f32::NAN; 30], &vocab, 5).is_empty());
    }

    #[test]
    fn zero_n_is_empty() {
        assert!(top_predictions(&[1.0], &["a"], 0).is_empty());
    }

    #[test]
    fn formats_two_decimals() {
        let s = format_predictions(&[("ApplyEyeMakeup", 0.9), ("Archery", 0.1)]);
        assert_eq!(s, "ApplyEyeMakeup: 0.90\nArchery: 0.10\n");
    }
}
