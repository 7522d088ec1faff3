use crate::error::PredictionError;
use ndarray::{Array1, Array2, ArrayView2, ArrayView4};

/// The two pretrained models behind the prediction pipeline.
///
/// Implementations are shared read-only across requests.
pub trait ModelService: Send + Sync + 'static {
    /// Maps a `(1, 300, 300, 3)` image tensor to a `(1, n)` feature vector.
    fn extract_features(&self, input: ArrayView4<'_, f32>) -> Result<Array2<f32>, PredictionError>;

    /// Maps a `(1, n)` feature vector to one score per class.
    fn classify(&self, features: ArrayView2<'_, f32>) -> Result<Array1<f32>, PredictionError>;
}
