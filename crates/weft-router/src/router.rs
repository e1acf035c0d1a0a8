//! The router object and the packet pipeline.
//!
//! One explicitly constructed [`Router`] owns every shared resource: the
//! buffer pool, the hook registry, the MAC pool, the metrics registry, and
//! the queue maps. Workers get `Arc` clones at creation; nothing lives in
//! process-wide globals, so independent routers can coexist in one process
//! (which is how the tests run).

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use weft_core::error::HookError;
use weft_core::hooks::{Field, HookRegistry, HookResult};
use weft_core::packet::{Egress, RouterPacket, PKT_BUF_SIZE};
use weft_core::path::{hop_mac_input, HOP_MAC_LEN};
use weft_core::types::{Dir, InterfaceId};
use weft_crypto::MacPool;
use weft_io::{BufferPool, MetricsRegistry, OutPkt, ShutdownToken, ENDHOST_PORT};

use crate::backend::BackendRegistry;
use crate::config::RouterConfig;
use crate::error::SetupError;
use crate::setup;

/// Clonable handle that triggers router shutdown from signal handlers.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.stop.send(true);
    }
}

/// Everything a pipeline worker needs, shared read-only.
struct PipelineCtx {
    hooks: HookRegistry,
    pool: Arc<BufferPool>,
    metrics: Arc<MetricsRegistry>,
    loc_out_qs: HashMap<usize, mpsc::Sender<OutPkt>>,
    intf_out_qs: HashMap<InterfaceId, mpsc::Sender<OutPkt>>,
}

/// A border router instance.
pub struct Router {
    config: RouterConfig,
    pool: Arc<BufferPool>,
    mac_pool: Arc<MacPool>,
    metrics: Arc<MetricsRegistry>,
    hooks: HookRegistry,
    backends: BackendRegistry,
    shutdown: ShutdownToken,
    // Populated by the setup hooks, consumed by start().
    ingress_qs: Vec<mpsc::Receiver<RouterPacket>>,
    loc_out_qs: HashMap<usize, mpsc::Sender<OutPkt>>,
    intf_out_qs: HashMap<InterfaceId, mpsc::Sender<OutPkt>>,
    bound_locals: HashMap<usize, SocketAddr>,
    started: bool,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Build a router from configuration. The forwarding MAC key must be
    /// present: hop-field verification across the AS needs a shared key, so
    /// there is no meaningful default.
    pub fn new(config: RouterConfig) -> Result<Self, SetupError> {
        let key_hex = config
            .router
            .mac_key
            .as_deref()
            .ok_or_else(|| SetupError::MacKey("router.mac_key is required".to_string()))?;
        let key = hex::decode(key_hex).map_err(|e| SetupError::MacKey(e.to_string()))?;
        let mac_pool = Arc::new(MacPool::new(&key).map_err(|e| SetupError::MacKey(e.to_string()))?);

        let pool = Arc::new(BufferPool::new(config.router.pool_capacity, PKT_BUF_SIZE));

        Ok(Self {
            config,
            pool,
            mac_pool,
            metrics: Arc::new(MetricsRegistry::new()),
            hooks: HookRegistry::new(),
            backends: BackendRegistry::with_defaults(),
            shutdown: ShutdownToken::new(),
            ingress_qs: Vec::new(),
            loc_out_qs: HashMap::new(),
            intf_out_qs: HashMap::new(),
            bound_locals: HashMap::new(),
            started: false,
        })
    }

    // -- Accessors used by backends and extension modules --

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn mac_pool(&self) -> &Arc<MacPool> {
        &self.mac_pool
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// The hook registry, for extension modules to append handlers during
    /// single-threaded startup. Frozen once [`start`](Self::start) runs.
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// The backend registry, for registering alternate network stacks
    /// before [`start`](Self::start).
    pub fn backends_mut(&mut self) -> &mut BackendRegistry {
        &mut self.backends
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: self.shutdown.trigger(),
        }
    }

    /// Register a spawned worker to be awaited at teardown.
    pub fn register_worker(&self, handle: JoinHandle<()>) {
        self.shutdown.add_task(handle);
    }

    /// Create a bounded ingress queue; the router keeps the receiving end
    /// for the pipeline and hands the sender to the socket reader.
    pub fn add_ingress_queue(&mut self) -> mpsc::Sender<RouterPacket> {
        let (tx, rx) = mpsc::channel(self.config.router.queue_depth);
        self.ingress_qs.push(rx);
        tx
    }

    pub fn set_local_output(&mut self, index: usize, queue: mpsc::Sender<OutPkt>) {
        self.loc_out_qs.insert(index, queue);
    }

    pub fn set_link_output(&mut self, ifid: InterfaceId, queue: mpsc::Sender<OutPkt>) {
        self.intf_out_qs.insert(ifid, queue);
    }

    pub fn record_bound_local(&mut self, index: usize, addr: SocketAddr) {
        self.bound_locals.insert(index, addr);
    }

    /// The actual bound address of a local index, once setup has run.
    /// Useful when the configuration asked for an ephemeral port.
    pub fn bound_local(&self, index: usize) -> Option<SocketAddr> {
        self.bound_locals.get(&index).copied()
    }

    // -- Lifecycle --

    /// Bring the router up: run the four setup phases, drop privileges,
    /// freeze the hook registry, and spawn one pipeline worker per ingress
    /// queue. Must be called from within a tokio runtime.
    pub async fn start(&mut self) -> Result<(), SetupError> {
        if self.started {
            return Err(SetupError::AlreadyStarted);
        }

        // Defaults register after any extension hooks so extensions get the
        // first word in every chain.
        self.register_default_hooks();

        let backends = self.backends.resolve(&self.config.router.backends)?;
        setup::setup_net(self, &backends)?;
        self.started = true;

        let ctx = Arc::new(PipelineCtx {
            hooks: mem::take(&mut self.hooks),
            pool: Arc::clone(&self.pool),
            metrics: Arc::clone(&self.metrics),
            loc_out_qs: mem::take(&mut self.loc_out_qs),
            intf_out_qs: mem::take(&mut self.intf_out_qs),
        });
        for ingress in self.ingress_qs.drain(..) {
            let ctx = Arc::clone(&ctx);
            self.shutdown
                .add_task(tokio::spawn(pipeline_worker(ctx, ingress)));
        }
        Ok(())
    }

    /// Block until shutdown is signalled.
    pub async fn run(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Signal every worker to stop and await their teardown. Readers exit
    /// and close the ingress queues, pipeline workers drain and drop the
    /// output queues, writers drain and exit.
    pub async fn shutdown(&mut self) {
        self.shutdown.signal_stop();
        self.shutdown.join_all().await;
    }

    /// Default hooks: the fallbacks that run when no extension claimed a
    /// field. Registered last, mirroring the POSIX backend in the setup
    /// chains.
    fn register_default_hooks(&mut self) {
        // Current interface from the reader's candidate list. A connected
        // link socket has exactly one candidate; a local socket can only be
        // decided here when it maps to a single link.
        self.hooks
            .if_curr
            .register(|pkt, _up, dir_from, _dir_to| {
                match (dir_from, pkt.ingress.if_ids.as_slice()) {
                    (Dir::External, [ifid, ..]) => Ok(HookResult::Finish(*ifid)),
                    (Dir::Local, [ifid]) => Ok(HookResult::Finish(*ifid)),
                    _ => Ok(HookResult::Continue),
                }
            });

        // Nothing to forward in an empty datagram.
        self.hooks.validate.register(|pkt| {
            if pkt.is_empty() {
                Err(HookError::new(Field::Validate, "empty datagram"))
            } else {
                Ok(HookResult::Continue)
            }
        });

        // Hop-field authentication, whenever both path fields resolved.
        let mac_pool = Arc::clone(&self.mac_pool);
        self.hooks.validate.register(move |pkt| {
            let (Some(info), Some(hop)) = (pkt.resolved.info_field, pkt.resolved.hop_field) else {
                return Ok(HookResult::Continue);
            };
            let mut msg = hop_mac_input(&info, &hop);
            let tag = mac_pool
                .compute_mac(&mut msg)
                .map_err(|e| HookError::new(Field::Validate, e.to_string()))?;
            if tag[..HOP_MAC_LEN] == hop.mac {
                Ok(HookResult::Continue)
            } else {
                Err(HookError::new(Field::Validate, "hop field MAC mismatch"))
            }
        });

        // Direction-based routing fallback: local traffic leaves through
        // the resolved link, external traffic is delivered to the endhost
        // via the local address its link is configured against.
        let link_local: HashMap<InterfaceId, usize> = self
            .config
            .links
            .iter()
            .map(|l| (InterfaceId(l.id), l.local_index))
            .collect();
        self.hooks.route.register(move |pkt| {
            if pkt.resolved.egress.is_some() {
                return Ok(HookResult::Finish(()));
            }
            match pkt.dir_from {
                Dir::Local => match pkt.resolved.if_next.or(pkt.resolved.if_curr) {
                    Some(ifid) => {
                        pkt.resolved.egress = Some(Egress::External { ifid });
                        Ok(HookResult::Finish(()))
                    }
                    None => Ok(HookResult::Continue),
                },
                Dir::External => match pkt.resolved.dst_host {
                    Some(host) => {
                        let index = pkt
                            .resolved
                            .if_curr
                            .and_then(|i| link_local.get(&i).copied())
                            .unwrap_or(0);
                        pkt.resolved.egress = Some(Egress::Local {
                            index,
                            dst: SocketAddr::new(host.ip(), ENDHOST_PORT),
                        });
                        Ok(HookResult::Finish(()))
                    }
                    None => Ok(HookResult::Continue),
                },
            }
        });
    }
}

/// Resolve a packet's fields through the hook chains, then validate,
/// process, and route it. Any chain error fails exactly this packet.
pub(crate) fn process_packet(
    hooks: &HookRegistry,
    pkt: &mut RouterPacket,
) -> Result<(), HookError> {
    pkt.resolved.src_ia = hooks.src_ia.dispatch(pkt)?;
    pkt.resolved.src_host = hooks.src_host.dispatch(pkt)?;
    pkt.resolved.dst_ia = hooks.dst_ia.dispatch(pkt)?;
    pkt.resolved.dst_host = hooks.dst_host.dispatch(pkt)?;
    pkt.resolved.info_field = hooks.info_field.dispatch(pkt)?;
    pkt.resolved.hop_field = hooks.hop_field.dispatch(pkt)?;
    pkt.resolved.up_flag = hooks.up_flag.dispatch(pkt)?;

    let up = pkt.resolved.up_flag.unwrap_or(true);
    let dir_from = pkt.dir_from;
    pkt.resolved.if_curr = hooks.if_curr.dispatch(pkt, up, dir_from, dir_from.flip())?;
    pkt.resolved.if_next = hooks.if_next.dispatch(pkt, up, dir_from, dir_from.flip())?;

    pkt.resolved.l4 = hooks.l4.dispatch(pkt)?;
    pkt.resolved.payload = hooks.payload.dispatch(pkt)?;

    hooks.validate.dispatch(pkt)?;
    hooks.process.dispatch(pkt)?;
    hooks.route.dispatch(pkt)?;
    Ok(())
}

/// Consume one ingress queue until its readers are gone.
async fn pipeline_worker(ctx: Arc<PipelineCtx>, mut ingress: mpsc::Receiver<RouterPacket>) {
    while let Some(mut pkt) = ingress.recv().await {
        ctx.metrics
            .pipeline
            .pkts_processed
            .fetch_add(1, Ordering::Relaxed);

        if let Err(e) = process_packet(&ctx.hooks, &mut pkt) {
            warn!(field = %e.field, err = %e, "dropping packet");
            ctx.metrics
                .pipeline
                .pkts_dropped_error
                .fetch_add(1, Ordering::Relaxed);
            ctx.pool.reclaim(pkt);
            continue;
        }

        match pkt.resolved.egress {
            Some(Egress::External { ifid }) => match ctx.intf_out_qs.get(&ifid) {
                Some(queue) => {
                    if let Err(e) = queue.send(OutPkt { pkt, dst: None }).await {
                        ctx.pool.reclaim(e.0.pkt);
                    }
                }
                None => {
                    warn!(%ifid, "no output queue for interface");
                    ctx.metrics
                        .pipeline
                        .pkts_dropped_unrouted
                        .fetch_add(1, Ordering::Relaxed);
                    ctx.pool.reclaim(pkt);
                }
            },
            Some(Egress::Local { index, dst }) => match ctx.loc_out_qs.get(&index) {
                Some(queue) => {
                    if let Err(e) = queue.send(OutPkt { pkt, dst: Some(dst) }).await {
                        ctx.pool.reclaim(e.0.pkt);
                    }
                }
                None => {
                    warn!(index, "no output queue for local address");
                    ctx.metrics
                        .pipeline
                        .pkts_dropped_unrouted
                        .fetch_add(1, Ordering::Relaxed);
                    ctx.pool.reclaim(pkt);
                }
            },
            // Absence policy: an unrouted packet is dropped and counted.
            None => {
                ctx.metrics
                    .pipeline
                    .pkts_dropped_unrouted
                    .fetch_add(1, Ordering::Relaxed);
                ctx.pool.reclaim(pkt);
            }
        }
    }
}
