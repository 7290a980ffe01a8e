use crate::RivetResourceId;

/// Notified once per referenced resource during a flush so a residency manager can keep the
/// resource mapped while the commands that use it are in flight. Implementations must be cheap,
/// this is called on the hot path.
pub trait RivetResidencyHook {
    fn mark_used(
        &self,
        resource: RivetResourceId,
    );
}

/// Hook that ignores every notification, for callers without a residency manager
#[derive(Default)]
pub struct RivetNopResidencyHook;

impl RivetResidencyHook for RivetNopResidencyHook {
    fn mark_used(
        &self,
        _resource: RivetResourceId,
    ) {
    }
}
