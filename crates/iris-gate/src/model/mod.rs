//! # Model Handle
//!
//! The classifier behind `POST /predict`. A model is loaded exactly once, at
//! startup, and is then shared read-only by every in-flight request.
//!
//! ## Usage
//!
//! Code that serves predictions is written against the [`Classifier`] trait,
//! so the request pipeline stays independent of the concrete model. The
//! shipped implementation is [`LogisticModel`], a multinomial logistic
//! regression read from a safetensors artifact.

mod logistic;

#[cfg(test)]
/// Counting classifier used by the pipeline and server tests.
pub(crate) mod mock;

use std::fmt::{self, Display};
use serde::{Deserialize, Serialize};

pub use logistic::{LogisticModel, COEF, INTERCEPT, SCALER_MEAN, SCALER_SCALE};

/// Number of measurements in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 4;

/// Number of classes a [`Classifier`] chooses between
pub const CLASS_COUNT: usize = 3;

/// The four flower measurements a prediction is made from, in centimetres.
///
/// Every field is required; values are not range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    /// Returns the measurements in model input order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }
}

/// The closed set of labels a class index resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Setosa,
    Versicolor,
    Virginica,
}

impl Label {
    /// Labels ordered by class index.
    pub const ALL: [Label; CLASS_COUNT] = [Label::Setosa, Label::Versicolor, Label::Virginica];

    /// Resolves a class index produced by a [`Classifier`].
    ///
    /// # Panics
    ///
    /// Panics if `index >= CLASS_COUNT`. A classifier returning such an
    /// index is broken, and the request must not be answered with a guess.
    pub fn from_index(index: usize) -> Self {
        match Self::ALL.get(index) {
            Some(label) => *label,
            None => panic!("class index {} is out of range for {} labels", index, CLASS_COUNT),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Setosa => "setosa",
            Label::Versicolor => "versicolor",
            Label::Virginica => "virginica",
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-trained model that maps a [`FeatureVector`] to a class index.
///
/// Implementations must be pure: no state changes between calls, so a single
/// instance can serve any number of concurrent requests without locking.
pub trait Classifier: Send + Sync + 'static {
    /// Predicts the class of `features`.
    ///
    /// # Returns
    ///
    /// An index in `0..CLASS_COUNT`
    fn predict(&self, features: &FeatureVector) -> usize;
}
