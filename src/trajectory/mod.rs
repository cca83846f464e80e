pub mod loader;
pub mod types;

pub use self::loader::{load_raw, read_raw};
pub use self::types::{NoiseAnnotation, PointKey, TrajectoryPoint, TrajectorySet};
