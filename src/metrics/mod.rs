mod registry;

pub use registry::{Metrics, get_metrics, init_metrics};
