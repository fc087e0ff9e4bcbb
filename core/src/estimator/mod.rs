pub mod knn;
pub mod model;

pub use knn::{KnnRegressor, TrainingRow};
pub use model::{save_knn, PositionEstimator, Regressor};
