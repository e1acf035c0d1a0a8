//! Socket writer: drains one bounded output queue per socket.
//!
//! Delivery is at-most-once and best-effort: a transport error or short
//! write abandons that packet with a log line and no retry. Whatever the
//! outcome, the buffer goes back to the pool exactly once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::error;

use weft_core::packet::RouterPacket;

use crate::metrics::SocketMetrics;
use crate::pool::BufferPool;

/// A routed packet plus its overlay destination. `dst` is `None` on
/// connected link sockets, which already know their peer.
pub struct OutPkt {
    pub pkt: RouterPacket,
    pub dst: Option<SocketAddr>,
}

/// Drain `queue` until every sender is gone.
pub async fn write_output(
    socket: Arc<UdpSocket>,
    pool: Arc<BufferPool>,
    metrics: Arc<SocketMetrics>,
    mut queue: mpsc::Receiver<OutPkt>,
) {
    while let Some(out) = queue.recv().await {
        send_packet(&socket, &pool, &metrics, out).await;
    }
}

/// Send one packet and reclaim its buffer on every exit path.
async fn send_packet(
    socket: &UdpSocket,
    pool: &BufferPool,
    metrics: &SocketMetrics,
    out: OutPkt,
) {
    let OutPkt { pkt, dst } = out;
    let start = Instant::now();
    let result = match dst {
        Some(addr) => socket.send_to(pkt.raw(), addr).await,
        None => socket.send(pkt.raw()).await,
    };
    match result {
        Err(e) => error!(err = %e, ?dst, "error sending packet"),
        Ok(written) if written != pkt.len() => {
            error!(len = pkt.len(), written, "unable to write full packet");
        }
        Ok(written) => metrics.record_sent(written, start.elapsed()),
    }
    // Success, transport error, or short write all converge here.
    pool.reclaim(pkt);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn harness() -> (Arc<BufferPool>, Arc<SocketMetrics>) {
        (
            Arc::new(BufferPool::new(8, 2048)),
            Arc::new(SocketMetrics::default()),
        )
    }

    #[tokio::test]
    async fn successful_send_reclaims_and_counts() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let (pool, metrics) = harness();
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(write_output(
            Arc::clone(&socket),
            Arc::clone(&pool),
            Arc::clone(&metrics),
            rx,
        ));

        let mut pkt = pool.get();
        pkt.load(b"egress bytes");
        tx.send(OutPkt {
            pkt,
            dst: Some(peer_addr),
        })
        .await
        .unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .expect("timed out waiting for egress datagram")
            .unwrap();
        assert_eq!(&buf[..n], b"egress bytes");

        drop(tx);
        handle.await.unwrap();

        assert_eq!(pool.outstanding(), 0, "buffer must be reclaimed on success");
        assert_eq!(metrics.pkts_sent.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.bytes_sent.load(Ordering::Relaxed), 12);
    }

    #[tokio::test]
    async fn send_error_abandons_packet_but_reclaims_buffer() {
        // `send` without a connected peer fails immediately.
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (pool, metrics) = harness();
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(write_output(
            Arc::clone(&socket),
            Arc::clone(&pool),
            Arc::clone(&metrics),
            rx,
        ));

        let mut pkt = pool.get();
        pkt.load(b"doomed");
        tx.send(OutPkt { pkt, dst: None }).await.unwrap();

        drop(tx);
        handle.await.unwrap();

        assert_eq!(pool.outstanding(), 0, "buffer must be reclaimed on error");
        assert_eq!(
            metrics.pkts_sent.load(Ordering::Relaxed),
            0,
            "failed sends are not counted as sent"
        );
    }

    #[tokio::test]
    async fn writer_exits_when_queue_closes() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let (pool, metrics) = harness();
        let (tx, rx) = mpsc::channel::<OutPkt>(1);

        let handle = tokio::spawn(write_output(socket, pool, metrics, rx));
        drop(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("writer should exit once senders are gone")
            .unwrap();
    }

    #[tokio::test]
    async fn buffer_lifecycle_is_exactly_once_across_outcomes() {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let (pool, metrics) = harness();
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(write_output(
            Arc::clone(&socket),
            Arc::clone(&pool),
            Arc::clone(&metrics),
            rx,
        ));

        // Mix of successes and failures through the same writer.
        for i in 0..6 {
            let mut pkt = pool.get();
            pkt.load(&[i as u8; 16]);
            let dst = if i % 2 == 0 { Some(peer_addr) } else { None };
            tx.send(OutPkt { pkt, dst }).await.unwrap();
        }
        assert!(pool.outstanding() <= 6);

        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            pool.outstanding(),
            0,
            "every buffer reclaimed exactly once regardless of outcome"
        );
        assert_eq!(metrics.pkts_sent.load(Ordering::Relaxed), 3);
    }
}
