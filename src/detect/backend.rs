use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Object detector backend.
///
/// The detector is an opaque collaborator: a frame goes in, boxes with class
/// ids come out. Row order is significant when the backend supplies no track
/// ids, because the row index then becomes the detection identity.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
