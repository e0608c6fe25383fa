use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ssdbox::{
    jaccard_overlap, rank_by_score, select_top_k_with_nms, select_top_k_with_nms_config,
    BoxCorners, NmsConfig, SuppressionMode,
};

fn boxes(values: &[[f32; 4]]) -> Vec<f32> {
    values.iter().flatten().copied().collect()
}

#[test]
fn duplicate_of_second_ranked_box_is_suppressed() {
    let scores = [0.9, 0.8, 0.95];
    let loc = boxes(&[
        [0.0, 0.0, 0.1, 0.1],
        [0.0, 0.0, 0.1, 0.1],
        [0.5, 0.5, 0.6, 0.6],
    ]);
    let out = select_top_k_with_nms(&scores, &loc, 3, 3).unwrap();
    assert_eq!(out.scores, vec![0.95, 0.9]);
    assert_eq!(
        out.boxes,
        boxes(&[[0.5, 0.5, 0.6, 0.6], [0.0, 0.0, 0.1, 0.1]])
    );
}

/// A chain A-B-C where B overlaps both A and C, but A and C are disjoint.
fn chain_fixture() -> (Vec<f32>, Vec<f32>) {
    let scores = vec![0.9, 0.8, 0.7];
    let loc = boxes(&[
        [0.0, 0.0, 1.0, 0.4],
        [0.0, 0.2, 1.0, 0.6],
        [0.0, 0.4, 1.0, 0.8],
    ]);
    (scores, loc)
}

#[test]
fn all_ranked_mode_lets_suppressed_boxes_suppress() {
    let (scores, loc) = chain_fixture();
    let a = BoxCorners::from_slice(&loc[0..4]).unwrap();
    let b = BoxCorners::from_slice(&loc[4..8]).unwrap();
    let c = BoxCorners::from_slice(&loc[8..12]).unwrap();
    assert!(jaccard_overlap(&a, &b) < 0.45);
    assert!(jaccard_overlap(&a, &c) == 0.0);
    assert!(jaccard_overlap(&b, &c) < 0.45);

    // With a lower threshold B is suppressed by A, and C by the suppressed B.
    let cfg = NmsConfig {
        top_k: 3,
        iou_threshold: 0.3,
        suppression: SuppressionMode::AllRanked,
    };
    let out = select_top_k_with_nms_config(&scores, &loc, 3, cfg).unwrap();
    assert_eq!(out.scores, vec![0.9]);
}

#[test]
fn kept_only_mode_ignores_suppressed_boxes() {
    let (scores, loc) = chain_fixture();
    let cfg = NmsConfig {
        top_k: 3,
        iou_threshold: 0.3,
        suppression: SuppressionMode::KeptOnly,
    };
    let out = select_top_k_with_nms_config(&scores, &loc, 3, cfg).unwrap();
    assert_eq!(out.scores, vec![0.9, 0.7]);
}

#[test]
fn only_top_k_candidates_are_considered() {
    let scores = [0.1, 0.9, 0.5, 0.7];
    let loc = boxes(&[
        [0.0, 0.0, 0.1, 0.1],
        [0.2, 0.2, 0.3, 0.3],
        [0.4, 0.4, 0.5, 0.5],
        [0.6, 0.6, 0.7, 0.7],
    ]);
    let out = select_top_k_with_nms(&scores, &loc, 4, 2).unwrap();
    assert_eq!(out.scores, vec![0.9, 0.7]);
}

#[test]
fn equal_scores_keep_buffer_order() {
    let scores = [0.5, 0.5, 0.5];
    let loc = boxes(&[
        [0.0, 0.0, 0.1, 0.1],
        [0.3, 0.3, 0.4, 0.4],
        [0.6, 0.6, 0.7, 0.7],
    ]);
    let out = select_top_k_with_nms(&scores, &loc, 3, 3).unwrap();
    assert_eq!(out.boxes, loc);
}

fn random_layer(rng: &mut StdRng, n: usize) -> (Vec<f32>, Vec<f32>) {
    let mut scores = Vec::with_capacity(n);
    let mut loc = Vec::with_capacity(n * 4);
    for _ in 0..n {
        let score: f32 = rng.random_range(0.0..1.0);
        scores.push(score);
        let ymin: f32 = rng.random_range(0.0..0.8);
        let xmin: f32 = rng.random_range(0.0..0.8);
        let h: f32 = rng.random_range(0.05..0.2);
        let w: f32 = rng.random_range(0.05..0.2);
        loc.extend_from_slice(&[ymin, xmin, ymin + h, xmin + w]);
    }
    (scores, loc)
}

/// Checks ordering and that every kept box is clear of every candidate ranked
/// above it. Kept entries are a subsequence of the ranking, so each one is
/// located by walking the ranking forward and matching index-resolved boxes.
fn assert_kept_clear_of_earlier(scores: &[f32], loc: &[f32], top_k: usize) {
    let out = select_top_k_with_nms(scores, loc, scores.len(), top_k).unwrap();
    assert!(!out.is_empty());
    assert!(out.len() <= top_k);
    assert_eq!(out.boxes.len(), out.len() * 4);
    assert!(out.scores.windows(2).all(|w| w[0] >= w[1]));

    let ranked = rank_by_score(scores, top_k);
    let ranked_boxes: Vec<BoxCorners> = ranked
        .iter()
        .map(|c| BoxCorners::from_slice(&loc[c.index * 4..]).unwrap())
        .collect();
    let mut cursor = 0;
    for det in out.detections() {
        let offset = ranked[cursor..]
            .iter()
            .zip(&ranked_boxes[cursor..])
            .position(|(c, b)| c.score == det.score && *b == det.bbox)
            .unwrap();
        let rank = cursor + offset;
        for other in &ranked_boxes[..rank] {
            assert!(jaccard_overlap(&det.bbox, other) <= 0.45);
        }
        cursor = rank + 1;
    }
}

#[test]
fn random_layers_respect_output_invariants() {
    let mut rng = StdRng::seed_from_u64(0x55D_B0C5);
    for _ in 0..20 {
        let (scores, loc) = random_layer(&mut rng, 64);
        assert_kept_clear_of_earlier(&scores, &loc, 40);
    }
}

#[test]
fn tied_scores_respect_output_invariants() {
    let mut rng = StdRng::seed_from_u64(0x71E5);
    for _ in 0..20 {
        let (scores, loc) = random_layer(&mut rng, 64);
        // Four score levels, so most candidates share a score with others.
        let scores: Vec<f32> = scores.iter().map(|s| (s * 4.0).floor() / 4.0).collect();
        assert_kept_clear_of_earlier(&scores, &loc, 40);
    }
}

#[test]
fn kept_only_never_keeps_fewer_than_all_ranked() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let n = 48;
        let (scores, loc) = random_layer(&mut rng, n);
        let strict = select_top_k_with_nms(&scores, &loc, n, n).unwrap();
        let greedy = select_top_k_with_nms_config(
            &scores,
            &loc,
            n,
            NmsConfig {
                top_k: n,
                suppression: SuppressionMode::KeptOnly,
                ..NmsConfig::default()
            },
        )
        .unwrap();
        assert!(greedy.len() >= strict.len());
    }
}
