use anyhow::Result;

use crate::detect::result::Detection;
use crate::photo::Photo;

/// Object detector backend.
///
/// A backend is a loaded, possibly stateful model. It is constructed by the
/// caller and injected into an `Analyzer`; nothing in this crate keeps a
/// process-wide model.
///
/// Implementations must treat the photo as read-only and must not retain it
/// beyond the `detect` call. `detect` may be called from several threads at
/// once, so any interior state has to be synchronized by the backend itself.
pub trait DetectorBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a photo.
    ///
    /// Returning an error is allowed; the analyzer treats it as "no detections".
    fn detect(&self, photo: &Photo) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
