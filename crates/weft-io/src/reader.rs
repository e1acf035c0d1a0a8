//! Socket reader: the blocking receive loop, one per bound socket.
//!
//! The reader owns the ingress side of a socket for its whole life: obtain
//! a buffer from the pool, receive into it, stamp ingress metadata, and
//! push it onto the bounded ingress queue. A full queue blocks the reader —
//! deliberate backpressure. Once the reader stops draining, the kernel's
//! own receive buffer fills and further datagrams are dropped at the OS
//! layer, which is the chosen overload policy.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use weft_core::packet::RouterPacket;
use weft_core::types::{Dir, InterfaceId};

use crate::metrics::SocketMetrics;
use crate::pool::BufferPool;

/// Run the receive loop for one socket until shutdown.
///
/// `if_ids` is the set of external interfaces this socket could represent;
/// a local-address socket may carry several, a connected link socket
/// exactly one. Transient receive errors are logged and the loop continues;
/// nothing short of shutdown terminates it. A buffer is only taken from the
/// pool once the socket is readable, so an idle reader holds none.
pub async fn read_input(
    socket: Arc<UdpSocket>,
    dir_from: Dir,
    if_ids: Vec<InterfaceId>,
    pool: Arc<BufferPool>,
    metrics: Arc<SocketMetrics>,
    ingress: mpsc::Sender<RouterPacket>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let dst = match socket.local_addr() {
        Ok(a) => a,
        Err(e) => {
            error!(err = %e, "unable to query local socket address");
            return;
        }
    };
    info!(addr = %dst, dir = %dir_from, "listening");

    loop {
        metrics.input_loops.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        tokio::select! {
            readable = socket.readable() => {
                if let Err(e) = readable {
                    error!(socket = %dst, err = %e, "error waiting on socket");
                    continue;
                }
            }
            _ = stop_rx.changed() => break,
        }

        let mut pkt = pool.get();
        pkt.dir_from = dir_from;
        match socket.try_recv_from(pkt.recv_buf()) {
            Ok((len, src)) => {
                metrics.record_recv(len, start.elapsed());
                pkt.trim(len);
                pkt.time_in = Some(Instant::now());
                pkt.ingress.src = Some(src);
                pkt.ingress.dst = Some(dst);
                pkt.ingress.if_ids = if_ids.clone();
                // Blocks when the queue is full; the kernel drops overflow,
                // not us.
                if let Err(e) = ingress.send(pkt).await {
                    pool.reclaim(e.0);
                    return;
                }
            }
            // Spurious readiness; try again.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => pool.reclaim(pkt),
            Err(e) => {
                error!(socket = %dst, err = %e, "error reading from socket");
                pool.reclaim(pkt);
            }
        }
    }
}
