use std::array;
use std::collections::HashMap;
use std::path::Path;
use candle_core::{DType, Device, Tensor};
use tracing::{debug, info};
use crate::error::ModelError;
use super::{Classifier, FeatureVector, CLASS_COUNT, FEATURE_COUNT};

/// Tensor name of the `[CLASS_COUNT, FEATURE_COUNT]` weight matrix
pub const COEF: &str = "coef";
/// Tensor name of the `[CLASS_COUNT]` bias vector
pub const INTERCEPT: &str = "intercept";
/// Tensor name of the optional `[FEATURE_COUNT]` standardization mean
pub const SCALER_MEAN: &str = "scaler.mean";
/// Tensor name of the optional `[FEATURE_COUNT]` standardization scale
pub const SCALER_SCALE: &str = "scaler.scale";

/// A multinomial logistic-regression classifier.
///
/// The artifact is a safetensors file holding [`COEF`] and [`INTERCEPT`], and
/// optionally a standardization step ([`SCALER_MEAN`] and [`SCALER_SCALE`])
/// applied to the features before the linear map. Tensors of any float dtype
/// are accepted and widened to `f64` when loaded, and predictions are computed
/// in `f64` so no valid JSON number overflows on the way in.
///
/// Once loaded the weights live in plain arrays, so [`Classifier::predict`]
/// has no failure mode and never allocates.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    coef: [[f64; FEATURE_COUNT]; CLASS_COUNT],
    intercept: [f64; CLASS_COUNT],
    scaler: Option<Standardizer>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Standardizer {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl LogisticModel {
    /// Builds a model from raw weights, without standardization.
    pub fn new(coef: [[f64; FEATURE_COUNT]; CLASS_COUNT], intercept: [f64; CLASS_COUNT]) -> Self {
        Self {
            coef,
            intercept,
            scaler: None,
        }
    }

    /// Adds a standardization step, `(x - mean) / scale`, ahead of the linear map.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidScale`] if any scale is not a positive finite number
    pub fn with_scaler(
        mut self,
        mean: [f64; FEATURE_COUNT],
        scale: [f64; FEATURE_COUNT],
    ) -> Result<Self, ModelError> {
        check_finite(SCALER_MEAN, &mean)?;
        if scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ModelError::InvalidScale);
        }
        self.scaler = Some(Standardizer { mean, scale });
        Ok(self)
    }

    /// Loads a model artifact from disk.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, is not a safetensors file, or does not
    /// hold the tensors described on [`LogisticModel`] with the right shapes.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(|source| {
            ModelError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(tensors = tensors.len(), path = %path.display(), "decoded model artifact");

        let model = Self::from_tensors(&tensors)?;
        info!(
            path = %path.display(),
            standardized = model.scaler.is_some(),
            "loaded logistic regression model"
        );
        Ok(model)
    }

    /// Builds a model from named tensors, as found in an artifact.
    pub fn from_tensors(tensors: &HashMap<String, Tensor>) -> Result<Self, ModelError> {
        let coef = matrix(tensors, COEF)?;
        let intercept = vector::<CLASS_COUNT>(tensors, INTERCEPT)?;
        let model = Self::new(coef, intercept);

        match (tensors.contains_key(SCALER_MEAN), tensors.contains_key(SCALER_SCALE)) {
            (false, false) => Ok(model),
            (true, false) => Err(ModelError::MissingTensor(SCALER_SCALE)),
            (false, true) => Err(ModelError::MissingTensor(SCALER_MEAN)),
            (true, true) => model.with_scaler(
                vector::<FEATURE_COUNT>(tensors, SCALER_MEAN)?,
                vector::<FEATURE_COUNT>(tensors, SCALER_SCALE)?,
            ),
        }
    }

    /// Returns the model as named `f64` tensors, the inverse of [`LogisticModel::from_tensors`].
    pub fn to_tensors(&self) -> Result<HashMap<String, Tensor>, ModelError> {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(COEF.to_string(), Tensor::new(&self.coef, &device)?);
        tensors.insert(INTERCEPT.to_string(), Tensor::new(&self.intercept, &device)?);
        if let Some(scaler) = &self.scaler {
            tensors.insert(SCALER_MEAN.to_string(), Tensor::new(&scaler.mean, &device)?);
            tensors.insert(SCALER_SCALE.to_string(), Tensor::new(&scaler.scale, &device)?);
        }
        Ok(tensors)
    }

    /// Writes the model as a safetensors artifact that [`LogisticModel::load`] reads back.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        candle_core::safetensors::save(&self.to_tensors()?, path.as_ref())?;
        Ok(())
    }

    /// Computes the unnormalized class scores for `features`.
    pub fn logits(&self, features: &FeatureVector) -> [f64; CLASS_COUNT] {
        let mut x = features.to_array();
        if let Some(scaler) = &self.scaler {
            for (i, value) in x.iter_mut().enumerate() {
                *value = (*value - scaler.mean[i]) / scaler.scale[i];
            }
        }

        array::from_fn(|class| {
            self.coef[class]
                .iter()
                .zip(x.iter())
                .map(|(w, v)| w * v)
                .sum::<f64>()
                + self.intercept[class]
        })
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> usize {
        let logits = self.logits(features);
        // strict comparison keeps the lowest index on ties and on NaN
        let mut best = 0;
        for (class, score) in logits.iter().enumerate().skip(1) {
            if *score > logits[best] {
                best = class;
            }
        }
        best
    }
}

fn require<'a>(
    tensors: &'a HashMap<String, Tensor>,
    name: &'static str,
    shape: &[usize],
) -> Result<&'a Tensor, ModelError> {
    let tensor = tensors.get(name).ok_or(ModelError::MissingTensor(name))?;
    if tensor.dims() != shape {
        return Err(ModelError::Shape {
            name,
            expected: shape.to_vec(),
            actual: tensor.dims().to_vec(),
        });
    }
    Ok(tensor)
}

fn matrix(
    tensors: &HashMap<String, Tensor>,
    name: &'static str,
) -> Result<[[f64; FEATURE_COUNT]; CLASS_COUNT], ModelError> {
    let rows = require(tensors, name, &[CLASS_COUNT, FEATURE_COUNT])?
        .to_dtype(DType::F64)?
        .to_vec2::<f64>()?;

    let mut out = [[0f64; FEATURE_COUNT]; CLASS_COUNT];
    for (dst, src) in out.iter_mut().zip(rows.iter()) {
        dst.copy_from_slice(src);
        check_finite(name, &dst[..])?;
    }
    Ok(out)
}

fn vector<const N: usize>(
    tensors: &HashMap<String, Tensor>,
    name: &'static str,
) -> Result<[f64; N], ModelError> {
    let values = require(tensors, name, &[N])?
        .to_dtype(DType::F64)?
        .to_vec1::<f64>()?;

    let mut out = [0f64; N];
    out.copy_from_slice(&values);
    check_finite(name, &out)?;
    Ok(out)
}

fn check_finite(name: &'static str, values: &[f64]) -> Result<(), ModelError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::NonFinite(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Label;
    use crate::model::mock::iris_model;

    fn features(values: [f64; 4]) -> FeatureVector {
        FeatureVector {
            sepal_length: values[0],
            sepal_width: values[1],
            petal_length: values[2],
            petal_width: values[3],
        }
    }

    #[test]
    fn test_predicts_each_species() {
        let model = iris_model();
        assert_eq!(Label::from_index(model.predict(&features([5.1, 3.5, 1.4, 0.2]))), Label::Setosa);
        assert_eq!(Label::from_index(model.predict(&features([5.9, 2.8, 4.3, 1.3]))), Label::Versicolor);
        assert_eq!(Label::from_index(model.predict(&features([6.7, 3.0, 5.2, 2.3]))), Label::Virginica);
    }

    #[test]
    fn test_inputs_beyond_f32_range() {
        let model = iris_model();
        let huge = features([1e39, 1e39, 1e39, 1e39]);

        assert!(model.logits(&huge).iter().all(|v| v.is_finite()));
        assert_eq!(Label::from_index(model.predict(&huge)), Label::Virginica);
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        let model = LogisticModel::new([[0.0; 4]; 3], [1.0, 1.0, 1.0]);
        assert_eq!(model.predict(&features([1.0, 1.0, 1.0, 1.0])), 0);

        let model = LogisticModel::new([[0.0; 4]; 3], [0.0, 2.0, 2.0]);
        assert_eq!(model.predict(&features([1.0, 1.0, 1.0, 1.0])), 1);
    }

    #[test]
    fn test_scaler_is_applied_before_weights() {
        // only the first feature matters, and only its sign after centering
        let model = LogisticModel::new(
            [[-1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [0.0; 4]],
            [0.0, 0.0, -100.0],
        )
        .with_scaler([5.0, 0.0, 0.0, 0.0], [0.5, 1.0, 1.0, 1.0])
        .unwrap();

        assert_eq!(model.predict(&features([4.0, 0.0, 0.0, 0.0])), 0);
        assert_eq!(model.predict(&features([6.0, 0.0, 0.0, 0.0])), 1);
        assert_eq!(model.logits(&features([6.0, 0.0, 0.0, 0.0]))[1], 2.0);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let result = iris_model().with_scaler([0.0; 4], [1.0, 0.0, 1.0, 1.0]);
        assert!(matches!(result, Err(ModelError::InvalidScale)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iris.safetensors");

        let model = iris_model().with_scaler([5.8, 3.0, 3.7, 1.2], [0.8, 0.4, 1.7, 0.7]).unwrap();
        model.save(&path).unwrap();

        assert_eq!(LogisticModel::load(&path).unwrap(), model);
    }

    #[test]
    fn test_load_widens_f32_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iris_f32.safetensors");

        let tensors: HashMap<String, Tensor> = iris_model()
            .to_tensors()
            .unwrap()
            .into_iter()
            .map(|(name, t)| (name, t.to_dtype(DType::F32).unwrap()))
            .collect();
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let loaded = LogisticModel::load(&path).unwrap();
        assert_eq!(loaded.predict(&features([5.1, 3.5, 1.4, 0.2])), 0);
    }

    #[test]
    fn test_shipped_artifact() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../models/iris.safetensors");
        let model = LogisticModel::load(path).unwrap();
        assert_eq!(model.predict(&features([5.1, 3.5, 1.4, 0.2])), 0);
        assert_eq!(model.predict(&features([5.9, 2.8, 4.3, 1.3])), 1);
        assert_eq!(model.predict(&features([6.7, 3.0, 5.2, 2.3])), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = LogisticModel::load(dir.path().join("absent.safetensors"));
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }

    #[test]
    fn test_load_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pkl");
        std::fs::write(&path, b"not a safetensors file").unwrap();

        let result = LogisticModel::load(&path);
        assert!(matches!(result, Err(ModelError::Decode { .. })));
    }

    #[test]
    fn test_missing_tensor() {
        let mut tensors = iris_model().to_tensors().unwrap();
        tensors.remove(INTERCEPT);
        let result = LogisticModel::from_tensors(&tensors);
        assert!(matches!(result, Err(ModelError::MissingTensor(INTERCEPT))));
    }

    #[test]
    fn test_half_a_scaler_is_rejected() {
        let mut tensors = iris_model().to_tensors().unwrap();
        tensors.insert(SCALER_MEAN.to_string(), Tensor::new(&[0f32; 4], &Device::Cpu).unwrap());
        let result = LogisticModel::from_tensors(&tensors);
        assert!(matches!(result, Err(ModelError::MissingTensor(SCALER_SCALE))));
    }

    #[test]
    fn test_wrong_shape() {
        let mut tensors = iris_model().to_tensors().unwrap();
        tensors.insert(COEF.to_string(), Tensor::zeros((4, 3), DType::F32, &Device::Cpu).unwrap());

        match LogisticModel::from_tensors(&tensors) {
            Err(ModelError::Shape { name, expected, actual }) => {
                assert_eq!(name, COEF);
                assert_eq!(expected, vec![3, 4]);
                assert_eq!(actual, vec![4, 3]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_weights() {
        let mut tensors = iris_model().to_tensors().unwrap();
        tensors.insert(
            INTERCEPT.to_string(),
            Tensor::new(&[0f32, f32::NAN, 0.0], &Device::Cpu).unwrap(),
        );
        let result = LogisticModel::from_tensors(&tensors);
        assert!(matches!(result, Err(ModelError::NonFinite(INTERCEPT))));
    }
}
