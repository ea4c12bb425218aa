pub mod curve;
pub mod gain;
pub mod utils;

pub use curve::{db_for, VolumeCurvePoint, VOLUME_CURVE};
pub use gain::{apply_gain, apply_gain_interleaved, compute_gain};
pub use utils::db_to_gain;
