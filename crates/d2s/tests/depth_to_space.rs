use d2s::error::{D2sError, Dim};
use d2s::ops::depth_to_space::{emit_node, transform, Mode};
use d2s::ops::pixel_shuffle::pixel_shuffle;
use d2s::tensor::{Shape, Tensor};
use d2s::validate::{assert_allclose, canonical_fixture, EquivalenceValidator, ToleranceConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn crd_matches_pixel_shuffle_on_fixture() {
    let input = canonical_fixture();
    let crd = transform(&input, 2, "CRD").unwrap();
    let reference = pixel_shuffle(&input, 2).unwrap();
    assert_eq!(crd.shape().dims(), &[1, 2, 4, 4]);
    assert_allclose(&crd, &reference, &ToleranceConfig::default()).unwrap();
}

#[test]
fn dcr_differs_from_crd_on_fixture() {
    let input = canonical_fixture();
    let dcr = transform(&input, 2, "DCR").unwrap();
    let crd = transform(&input, 2, "CRD").unwrap();
    assert_eq!(dcr.shape(), crd.shape());
    let differing = dcr
        .data()
        .iter()
        .zip(crd.data())
        .filter(|(a, b)| a != b)
        .count();
    assert!(differing > 0);
}

#[test]
fn descriptors_from_identical_arguments_are_equal() {
    let first = emit_node(2, "CRD", "x", "y").unwrap();
    let second = emit_node(2, "CRD", "x", "y").unwrap();
    assert_eq!(first, second);
    assert_ne!(first, emit_node(2, "DCR", "x", "y").unwrap());
}

#[test]
fn block_size_three_rejects_eight_channels_on_both_paths() {
    let input = Tensor::<f32>::zeros(Shape::new([1, 8, 2, 2]));
    for mode in Mode::ALL {
        match transform(&input, 3, mode) {
            Err(D2sError::Shape { dim, .. }) => assert_eq!(dim, Dim::Channel),
            other => panic!("{mode}: expected a channel shape error, got {other:?}"),
        }
    }
    // Emission cannot see the channel count, so it only checks the attribute range.
    assert!(emit_node(3, Mode::Crd, "x", "y").is_ok());
}

#[test]
fn both_paths_reject_the_same_parameters() {
    let input = canonical_fixture();
    for (block_size, mode) in [(0, "CRD"), (2, "dcr"), (2, "DRC"), (0, "")] {
        let eager = transform(&input, block_size, mode).unwrap_err();
        let symbolic = emit_node(block_size, mode, "x", "y").unwrap_err();
        assert_eq!(eager, symbolic, "block_size={block_size} mode={mode:?}");
    }
}

#[test]
fn validator_accepts_random_inputs() {
    let mut rng = StdRng::seed_from_u64(3);
    let validator = EquivalenceValidator::default();
    for (dims, block_size) in [([2, 18, 3, 2], 3), ([1, 32, 4, 4], 2), ([1, 5, 3, 3], 1)] {
        let input = Tensor::<f64>::randn(Shape::from(dims), 1.0, &mut rng);
        let report = validator.validate(&input, block_size).unwrap();
        assert_eq!(report.max_abs_diff, 0.0);
        assert!(report.dcr_consistent(), "{dims:?} s={block_size}: {report:?}");
    }
}

#[test]
fn tolerance_config_loads_from_file() {
    let path = std::env::temp_dir().join(format!("d2s_tolerance_{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "atol": 1e-3 }"#).unwrap();
    let config = ToleranceConfig::load_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.atol, 1e-3);
    assert_eq!(config.rtol, 0.0);

    let missing = ToleranceConfig::load_json(path.with_extension("absent"));
    assert!(missing.is_err());
}

#[test]
fn large_outputs_match_reference() {
    // Above the default parallel threshold.
    let input = Tensor::from_fn(Shape::new([2, 16, 64, 64]), |i| i as f32);
    let crd = transform(&input, 4, Mode::Crd).unwrap();
    assert_eq!(crd, pixel_shuffle(&input, 4).unwrap());
}
