use quarry_core::config::FusionOptions;
use quarry_core::types::{KeywordResult, VectorResult};
use quarry_hybrid::{fuse, rank};

fn kw(id: u64, score: f32) -> KeywordResult {
    KeywordResult { id, score, title: format!("k{id}"), text: format!("keyword {id}") }
}

fn vr(id: u64, similarity: f32) -> VectorResult {
    VectorResult { id, similarity, title: format!("v{id}"), text: format!("vector {id}") }
}

#[test]
fn reproduces_reference_example() {
    let keyword = vec![KeywordResult { id: 1, score: 2.5, title: "A".into(), text: "x".into() }];
    let vector = vec![
        VectorResult { id: 1, similarity: 0.9, title: "A".into(), text: "x".into() },
        VectorResult { id: 2, similarity: 0.4, title: "B".into(), text: "y".into() },
    ];
    let fused = fuse(&keyword, &vector, None, &FusionOptions::default());

    assert_eq!(fused.len(), 2);
    assert_eq!(fused[0].id, 2);
    assert_eq!(fused[0].rank, 0.8077);
    assert_eq!(fused[0].keyword_score, 0.0);
    assert_eq!(fused[0].semantic_score, 0.4);
    assert_eq!(fused[0].title, "B");
    assert_eq!(fused[1].id, 1);
    assert_eq!(fused[1].rank, 0.7365);
    assert_eq!(fused[1].keyword_score, 2.5);
    assert_eq!(fused[1].semantic_score, 0.9);
}

#[test]
fn union_contains_each_id_once() {
    let keyword = vec![kw(1, 3.0), kw(2, 1.0), kw(1, 0.5)];
    let vector = vec![vr(2, 0.8), vr(3, 0.7), vr(3, 0.1)];
    let fused = fuse(&keyword, &vector, None, &FusionOptions::default());

    let mut ids: Vec<u64> = fused.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    let one = fused.iter().find(|r| r.id == 1).unwrap();
    assert_eq!(one.keyword_score, 3.0, "first keyword hit per id is kept");
    let three = fused.iter().find(|r| r.id == 3).unwrap();
    assert_eq!(three.semantic_score, 0.7, "first vector hit per id is kept");
}

#[test]
fn missing_side_defaults_to_zero() {
    let fused = fuse(&[kw(1, 4.0)], &[vr(2, 0.5)], None, &FusionOptions::default());
    let one = fused.iter().find(|r| r.id == 1).unwrap();
    let two = fused.iter().find(|r| r.id == 2).unwrap();
    assert_eq!(one.semantic_score, 0.0);
    assert_eq!(two.keyword_score, 0.0);
    assert_eq!(one.rank, 0.9286);
    assert_eq!(two.rank, 0.8095);
}

#[test]
fn keyword_metadata_is_preferred_for_shared_ids() {
    let fused = fuse(&[kw(5, 1.0)], &[vr(5, 0.5)], None, &FusionOptions::default());
    assert_eq!(fused[0].title, "k5");
    assert_eq!(fused[0].text, "keyword 5");
}

#[test]
fn non_positive_scores_contribute_nothing() {
    let options = FusionOptions::default();
    assert_eq!(rank(0.0, 0.0, &options), 1.0);
    assert_eq!(rank(0.0, -0.3, &options), 1.0);
    let fused = fuse(&[], &[vr(9, -0.2)], None, &options);
    assert_eq!(fused[0].rank, 1.0);
    assert_eq!(fused[0].semantic_score, -0.2);
}

#[test]
fn limit_keeps_the_highest_ranked() {
    let keyword = vec![kw(1, 5.0), kw(2, 2.0), kw(3, 0.5)];
    let vector = vec![vr(4, 0.9), vr(2, 0.3)];
    let options = FusionOptions::default();
    let full = fuse(&keyword, &vector, None, &options);
    let top = fuse(&keyword, &vector, Some(2), &options);

    assert_eq!(top.len(), 2);
    assert_eq!(top, full[..2].to_vec());
    for pair in full.windows(2) { assert!(pair[0].rank >= pair[1].rank); }
    assert!(fuse(&keyword, &vector, Some(0), &options).is_empty());
    assert_eq!(fuse(&keyword, &vector, Some(100), &options).len(), 4);
}

#[test]
fn ties_are_broken_by_ascending_id() {
    let fused = fuse(&[kw(9, 1.0), kw(3, 1.0)], &[vr(6, 0.0)], None, &FusionOptions::default());
    let ids: Vec<u64> = fused.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![6, 3, 9]);
}

#[test]
fn fusion_is_deterministic() {
    let keyword: Vec<KeywordResult> = (1..=20).map(|i| kw(i, (i % 5) as f32 * 0.7)).collect();
    let vector: Vec<VectorResult> = (10..=30).map(|i| vr(i, (i % 7) as f32 / 7.0)).collect();
    let options = FusionOptions::default();
    let first = fuse(&keyword, &vector, Some(15), &options);
    for _ in 0..5 { assert_eq!(fuse(&keyword, &vector, Some(15), &options), first); }
}

#[test]
fn raising_semantic_weight_widens_the_semantic_discount() {
    let ks = 2.0;
    let ss = 0.6;
    let mut previous = f64::NEG_INFINITY;
    for ws in [0.5, 1.0, 2.0, 4.0] {
        let options = FusionOptions { semantic_weight: ws, ..FusionOptions::default() };
        let discount = rank(ks, 0.0, &options) - rank(ks, ss, &options);
        assert!(discount > previous, "ws={ws}");
        previous = discount;
    }
}

#[test]
fn custom_options_change_the_result() {
    let options = FusionOptions { keyword_weight: 3.0, semantic_weight: 1.0, rrf_k: 1.0 };
    let fused = fuse(&[kw(1, 1.0)], &[vr(2, 1.0)], None, &options);
    // 1 - 3/2 = -0.5 for the keyword hit, 1 - 1/2 = 0.5 for the vector hit
    assert_eq!(fused[0].id, 2);
    assert_eq!(fused[0].rank, 0.5);
    assert_eq!(fused[1].rank, -0.5);
}

#[test]
fn empty_inputs_fuse_to_nothing() {
    assert!(fuse(&[], &[], None, &FusionOptions::default()).is_empty());
    assert!(fuse(&[], &[], Some(3), &FusionOptions::default()).is_empty());
}
