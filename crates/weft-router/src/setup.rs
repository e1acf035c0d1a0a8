//! Four-phase network setup.
//!
//! Phases run in order: start (global backend initialization), add-local
//! (once per bound local address), add-external (once per link), finish
//! (post-configuration initialization). Within each chain the first
//! `Finish` claims the item and later backends are skipped; any error
//! aborts the entire startup sequence. After all phases succeed, elevated
//! privileges are dropped for good — traffic is only ever served from the
//! reduced set.

use std::sync::Arc;

use weft_core::hooks::HookResult;

use crate::backend::NetworkBackend;
use crate::error::SetupError;
use crate::privileges;
use crate::router::Router;

/// Run the full setup sequence against the resolved backend chain.
pub fn setup_net(
    router: &mut Router,
    backends: &[Arc<dyn NetworkBackend>],
) -> Result<(), SetupError> {
    for backend in backends {
        match backend.net_start(router)? {
            HookResult::Continue => continue,
            HookResult::Finish(()) => break,
        }
    }

    let locals = router.config().local.clone();
    for (index, local) in locals.iter().enumerate() {
        let overlay = local.overlay();
        let label = format!("loc:{index}");
        for backend in backends {
            match backend.add_local(router, index, &overlay, &label)? {
                HookResult::Continue => continue,
                HookResult::Finish(()) => break,
            }
        }
    }

    let links = router.config().links.clone();
    for link in &links {
        let label = format!("intf:{}", link.id);
        for backend in backends {
            match backend.add_external(router, link, &label)? {
                HookResult::Continue => continue,
                HookResult::Finish(()) => break,
            }
        }
    }

    for backend in backends {
        match backend.net_finish(router)? {
            HookResult::Continue => continue,
            HookResult::Finish(()) => break,
        }
    }

    privileges::drop_privileges()
}
