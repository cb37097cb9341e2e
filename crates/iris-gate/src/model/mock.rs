use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use super::{Classifier, FeatureVector};

// Always answers `class`, counting how often it was asked
#[derive(Clone, Debug)]
pub struct MockClassifier {
    pub(crate) class: usize,
    calls: Arc<AtomicUsize>,
}

impl MockClassifier {
    pub fn new(class: usize) -> Self {
        Self {
            class,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    fn predict(&self, _features: &FeatureVector) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.class
    }
}

// Roughly the weights of a logistic regression fit on the raw iris measurements
pub fn iris_model() -> super::LogisticModel {
    super::LogisticModel::new(
        [
            [-0.42, 0.97, -2.52, -1.08],
            [0.53, -0.32, -0.21, -0.94],
            [-0.11, -0.65, 2.73, 2.02],
        ],
        [9.85, 2.24, -12.09],
    )
}
