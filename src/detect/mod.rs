mod backend;
mod backends;
mod registry;
mod result;
pub mod yolo;

pub use backend::DetectorBackend;
pub use backends::FixtureBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};
