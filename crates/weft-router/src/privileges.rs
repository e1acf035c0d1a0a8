//! Irrevocable privilege drop.
//!
//! The router may start with elevated capabilities (binding privileged
//! ports, forcing kernel buffer sizes). Once every setup phase has run and
//! all sockets are open, nothing in the forwarding path needs them, so the
//! permitted set is cleared outright. Failure to query or apply the reduced
//! set is fatal: serving traffic with privileges we meant to shed is not an
//! option.

use caps::CapSet;
use tracing::debug;

use crate::error::SetupError;

/// Clear the effective and permitted capability sets of this process.
/// Clearing the permitted set makes the drop irrevocable.
pub fn drop_privileges() -> Result<(), SetupError> {
    let before = caps::read(None, CapSet::Permitted)
        .map_err(|e| SetupError::Privileges(e.to_string()))?;
    debug!(caps = ?before, "startup capabilities");

    caps::clear(None, CapSet::Effective).map_err(|e| SetupError::Privileges(e.to_string()))?;
    caps::clear(None, CapSet::Permitted).map_err(|e| SetupError::Privileges(e.to_string()))?;

    let after = caps::read(None, CapSet::Permitted)
        .map_err(|e| SetupError::Privileges(e.to_string()))?;
    debug!(caps = ?after, "cleared capabilities");
    Ok(())
}
