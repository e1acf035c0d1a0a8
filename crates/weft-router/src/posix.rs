//! The default POSIX-socket network backend.
//!
//! Opens plain UDP overlay sockets and spawns the reader/writer worker pair
//! for every local address and external link that no alternate backend
//! claimed first. Always registered last in the add-local/add-external
//! chains.

use std::sync::Arc;

use tokio::sync::mpsc;

use weft_core::hooks::HookResult;
use weft_core::types::{Dir, InterfaceId};
use weft_io::reader::read_input;
use weft_io::writer::write_output;
use weft_io::Overlay;

use crate::backend::{NetworkBackend, SetupOutcome};
use crate::config::LinkSection;
use crate::router::Router;

#[derive(Debug)]
pub struct PosixBackend;

impl NetworkBackend for PosixBackend {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn add_local(
        &self,
        router: &mut Router,
        index: usize,
        overlay: &Overlay,
        label: &str,
    ) -> SetupOutcome {
        let socket = Arc::new(overlay.listen()?);
        let local_addr = socket.local_addr().map_err(weft_io::OverlayError::Io)?;
        router.record_bound_local(index, local_addr);

        // Every link configured against this local address is a candidate
        // interface for datagrams arriving here.
        let if_ids: Vec<InterfaceId> = router
            .config()
            .links
            .iter()
            .filter(|l| l.local_index == index)
            .map(|l| InterfaceId(l.id))
            .collect();

        let metrics = router.metrics().socket(label);
        let ingress_tx = router.add_ingress_queue();
        router.register_worker(tokio::spawn(read_input(
            Arc::clone(&socket),
            Dir::Local,
            if_ids,
            Arc::clone(router.pool()),
            Arc::clone(&metrics),
            ingress_tx,
            router.subscribe_shutdown(),
        )));

        let (out_tx, out_rx) = mpsc::channel(router.config().router.queue_depth);
        router.set_local_output(index, out_tx);
        router.register_worker(tokio::spawn(write_output(
            socket,
            Arc::clone(router.pool()),
            metrics,
            out_rx,
        )));

        Ok(HookResult::Finish(()))
    }

    fn add_external(&self, router: &mut Router, link: &LinkSection, label: &str) -> SetupOutcome {
        let socket = Arc::new(link.overlay().connect(link.remote)?);
        let ifid = InterfaceId(link.id);

        let metrics = router.metrics().socket(label);
        let ingress_tx = router.add_ingress_queue();
        router.register_worker(tokio::spawn(read_input(
            Arc::clone(&socket),
            Dir::External,
            vec![ifid],
            Arc::clone(router.pool()),
            Arc::clone(&metrics),
            ingress_tx,
            router.subscribe_shutdown(),
        )));

        let (out_tx, out_rx) = mpsc::channel(router.config().router.queue_depth);
        router.set_link_output(ifid, out_tx);
        router.register_worker(tokio::spawn(write_output(
            socket,
            Arc::clone(router.pool()),
            metrics,
            out_rx,
        )));

        Ok(HookResult::Finish(()))
    }
}
