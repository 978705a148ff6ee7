//! Integration test: model selection end-to-end

use model_trainer::export::ModelArtifact;
use model_trainer::training::{
    r2_score, Candidate, DecisionTreeRegressor, KNNRegressor, LinearRegression, ModelScore,
    ModelTrainer, ParamGrid, Regressor, TrainerConfig, TrainingObserver,
};
use model_trainer::{ErrorKind, TrainerError};
use ndarray::{s, Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Rows of `[x0, x1, y]` with `y = 2*x0 - x1 + 1`
fn linear_matrix(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n * 3);
    for _ in 0..n {
        let x0: f64 = rng.gen_range(0.0..10.0);
        let x1: f64 = rng.gen_range(0.0..10.0);
        values.extend_from_slice(&[x0, x1, 2.0 * x0 - x1 + 1.0]);
    }
    Array2::from_shape_vec((n, 3), values).unwrap()
}

/// Rows of `[x0, x1, y]` where `y` is independent uniform noise
fn noise_matrix(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 3), |_| rng.gen_range(0.0..1.0))
}

#[derive(Clone, Default)]
struct RecordingObserver {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingObserver {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl TrainingObserver for RecordingObserver {
    fn on_split(&self, n_train: usize, n_test: usize, n_features: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("split {} {} {}", n_train, n_test, n_features));
    }

    fn on_candidate_start(&self, name: &str, _n_combinations: usize) {
        self.events.lock().unwrap().push(format!("start {}", name));
    }

    fn on_candidate_scored(&self, name: &str, _score: &ModelScore) {
        self.events.lock().unwrap().push(format!("scored {}", name));
    }

    fn on_best_model(&self, name: &str, _score: f64) {
        self.events.lock().unwrap().push(format!("best {}", name));
    }

    fn on_artifact_saved(&self, _path: &Path) {
        self.events.lock().unwrap().push("saved".to_string());
    }
}

fn trainer_at(path: &Path) -> ModelTrainer {
    ModelTrainer::new(TrainerConfig::default().with_artifact_path(path))
}

#[test]
fn test_linear_data_selects_and_persists_linear_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("models").join("best.bin");
    let train = linear_matrix(40, 1);
    let test = linear_matrix(15, 2);

    let candidates = vec![
        Candidate::untuned("Linear Regression", LinearRegression::new()),
        Candidate::new(
            "K-Neighbors Regressor",
            KNNRegressor::default(),
            ParamGrid::new().with("n_neighbors", vec![3usize, 5]),
        ),
    ];

    let observer = RecordingObserver::default();
    let outcome = trainer_at(&path)
        .with_observer(Box::new(observer.clone()))
        .run(&train, &test, &candidates)
        .unwrap();

    assert_eq!(outcome.best_model_name, "Linear Regression");
    assert!(outcome.best_score > 0.999, "score {}", outcome.best_score);
    assert_eq!(outcome.report.len(), 2);
    assert!(path.exists());

    let artifact = ModelArtifact::load(&path).unwrap();
    assert_eq!(artifact.metadata().model_name, "Linear Regression");
    assert_eq!(artifact.metadata().n_features, 2);

    let x_test = test.slice(s![.., ..2]).to_owned();
    let y_test = test.column(2).to_owned();
    let predictions = artifact.predict(&x_test).unwrap();
    assert!((r2_score(&y_test, &predictions) - outcome.best_score).abs() < 1e-12);

    let events = observer.events();
    assert_eq!(events.first().map(String::as_str), Some("split 40 15 2"));
    assert_eq!(events.last().map(String::as_str), Some("saved"));
    assert!(events.contains(&"best Linear Regression".to_string()));
}

#[test]
fn test_unlearnable_target_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    std::fs::write(&path, b"previous model").unwrap();

    let candidates = vec![Candidate::untuned("Linear Regression", LinearRegression::new())];
    let err = trainer_at(&path)
        .run(&noise_matrix(60, 3), &noise_matrix(30, 4), &candidates)
        .unwrap_err();

    match err {
        TrainerError::NoViableModel { best_model, best_score, threshold } => {
            assert_eq!(best_model, "Linear Regression");
            assert!(best_score < 0.6);
            assert_eq!(threshold, 0.6);
        }
        other => panic!("expected NoViableModel, got {other:?}"),
    }
    assert_eq!(std::fs::read(&path).unwrap(), b"previous model");
}

#[test]
fn test_single_column_matrix_rejected_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let train = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    let test = Array2::from_shape_vec((2, 1), vec![6.0, 7.0]).unwrap();

    let observer = RecordingObserver::default();
    let candidates = vec![Candidate::untuned("Linear Regression", LinearRegression::new())];
    let err = trainer_at(&path)
        .with_observer(Box::new(observer.clone()))
        .run(&train, &test, &candidates)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(observer.events().is_empty());
    assert!(!path.exists());
}

#[test]
fn test_one_feature_plus_target_is_enough() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let train = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 * i as f64 });
    let test = Array2::from_shape_fn((5, 2), |(i, j)| {
        let x = 20.0 + i as f64;
        if j == 0 { x } else { 3.0 * x }
    });

    let candidates = vec![Candidate::untuned("Linear Regression", LinearRegression::new())];
    let score = trainer_at(&path).select(&train, &test, &candidates).unwrap();
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn test_failing_candidate_names_itself() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let candidates = vec![
        Candidate::untuned("Linear Regression", LinearRegression::new()),
        Candidate::new(
            "K-Neighbors Regressor",
            KNNRegressor::default(),
            ParamGrid::new().with("n_neighbors", vec![0usize]),
        ),
    ];

    let err = trainer_at(&path)
        .run(&linear_matrix(30, 5), &linear_matrix(10, 6), &candidates)
        .unwrap_err();

    match &err {
        TrainerError::TrainingFailed { model, .. } => assert_eq!(model, "K-Neighbors Regressor"),
        other => panic!("expected TrainingFailed, got {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn test_tie_goes_to_first_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let candidates = vec![
        Candidate::untuned("first", LinearRegression::new()),
        Candidate::untuned("second", LinearRegression::new()),
    ];

    let outcome = trainer_at(&path)
        .run(&linear_matrix(30, 7), &linear_matrix(10, 8), &candidates)
        .unwrap();

    let scores: Vec<f64> = outcome.report.iter().map(|s| s.test_score).collect();
    assert_eq!(scores[0], scores[1]);
    assert_eq!(outcome.best_model_name, "first");
}

#[test]
fn test_untuned_candidate_matches_direct_fit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let train = linear_matrix(50, 9);
    let test = linear_matrix(20, 10);

    let candidates = vec![Candidate::untuned("Decision Tree", DecisionTreeRegressor::new())];
    let outcome = ModelTrainer::new(
        TrainerConfig::default()
            .with_artifact_path(&path)
            .with_min_score(-1.0e9),
    )
    .run(&train, &test, &candidates)
        .unwrap();

    let x_train = train.slice(s![.., ..2]).to_owned();
    let y_train: Array1<f64> = train.column(2).to_owned();
    let x_test = test.slice(s![.., ..2]).to_owned();
    let y_test: Array1<f64> = test.column(2).to_owned();

    let mut tree = DecisionTreeRegressor::new();
    tree.fit(&x_train, &y_train).unwrap();
    let expected = r2_score(&y_test, &tree.predict(&x_test).unwrap());

    let reported = outcome.report.get("Decision Tree").unwrap();
    assert_eq!(reported.test_score, expected);
    assert!(reported.cv_score.is_none());
    assert!(reported.best_params.is_empty());
}

#[test]
fn test_default_catalog_is_deterministic_with_seed() {
    let dir = tempfile::tempdir().unwrap();
    let train = linear_matrix(30, 11);
    let test = linear_matrix(10, 12);

    let run = |name: &str| {
        ModelTrainer::new(
            TrainerConfig::default()
                .with_artifact_path(dir.path().join(name))
                .with_random_state(7),
        )
        .with_observer(Box::new(model_trainer::training::NullObserver))
        .run(&train, &test, &model_trainer::training::default_candidates(Some(7)))
        .unwrap()
    };

    let a = run("a.bin");
    let b = run("b.bin");
    let scores_a: Vec<f64> = a.report.iter().map(|s| s.test_score).collect();
    let scores_b: Vec<f64> = b.report.iter().map(|s| s.test_score).collect();
    assert_eq!(scores_a, scores_b);
    assert_eq!(a.best_model_name, b.best_model_name);
    assert_eq!(a.report.len(), 6);
}

#[test]
fn test_initiate_model_trainer_on_linear_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    let score = trainer_at(&path)
        .initiate_model_trainer(&linear_matrix(40, 13), &linear_matrix(15, 14))
        .unwrap();

    assert!(score >= 0.6);
    let artifact = ModelArtifact::load(&path).unwrap();
    assert!((artifact.metadata().test_score - score).abs() < 1e-12);
}

#[test]
fn test_corrupted_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let candidates = vec![Candidate::untuned("Linear Regression", LinearRegression::new())];
    trainer_at(&path)
        .run(&linear_matrix(30, 15), &linear_matrix(10, 16), &candidates)
        .unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    // last bytes of the encoded model, just before the trailing checksum
    let idx = bytes.len() - 12;
    bytes[idx] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    assert!(ModelArtifact::load(&path).is_err());
}

#[test]
fn test_single_row_test_matrix_has_no_viable_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let train = Array2::from_shape_fn((10, 2), |(i, j)| if j == 0 { i as f64 } else { 2.0 * i as f64 });
    let test = Array2::from_shape_vec((1, 2), vec![20.0, 40.0]).unwrap();

    let candidates = vec![Candidate::untuned("Linear Regression", LinearRegression::new())];
    let err = trainer_at(&path).select(&train, &test, &candidates).unwrap_err();

    match err {
        TrainerError::NoViableModel { best_model, best_score, .. } => {
            assert_eq!(best_model, "Linear Regression");
            assert!(best_score.is_nan());
        }
        other => panic!("expected NoViableModel, got {other:?}"),
    }
    assert!(!path.exists());
}

#[test]
fn test_default_catalog_on_small_single_feature_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let line = |start: usize, n: usize| {
        Array2::from_shape_fn((n, 2), |(i, j)| {
            let x = (start + i) as f64;
            if j == 0 { x } else { 2.0 * x + 1.0 }
        })
    };

    let score = trainer_at(&path)
        .initiate_model_trainer(&line(1, 24), &line(25, 8))
        .unwrap();

    assert!(score > 0.99, "score {}", score);
    assert_eq!(ModelArtifact::load(&path).unwrap().metadata().model_name, "Linear Regression");
}
