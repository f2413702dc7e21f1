mod backend;
mod backends;
mod classes;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ReplayBackend, ScriptedBackend};
pub use classes::{ClassAllowList, ClassCatalog, DEFAULT_ALLOWED_CLASSES};
pub use result::{BoundingBox, Detection, PixelPoint, RawDetection};
