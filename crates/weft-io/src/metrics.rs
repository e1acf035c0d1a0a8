//! Per-socket forwarding counters.
//!
//! Counters are plain relaxed atomics shared between the socket workers and
//! whatever pulls them; an external exporter renders or scrapes them, which
//! is out of scope here beyond the plain-text [`MetricsRegistry::render`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Counters for one socket, keyed in the registry by its label
/// (`loc:<index>` for local addresses, `intf:<id>` for external links).
#[derive(Debug, Default)]
pub struct SocketMetrics {
    /// Passes through the receive loop, including errored ones.
    pub input_loops: AtomicU64,
    pub pkts_recv: AtomicU64,
    pub bytes_recv: AtomicU64,
    /// Cumulative time spent in the receive syscall, microseconds.
    pub input_process_us: AtomicU64,
    /// Cumulative time spent in the send syscall, microseconds.
    pub output_process_us: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub pkts_sent: AtomicU64,
}

impl SocketMetrics {
    pub fn record_recv(&self, bytes: usize, elapsed: Duration) {
        self.pkts_recv.fetch_add(1, Ordering::Relaxed);
        self.bytes_recv.fetch_add(bytes as u64, Ordering::Relaxed);
        self.input_process_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize, elapsed: Duration) {
        self.pkts_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.output_process_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn render(&self, label: &str, out: &mut String) {
        push_counter(out, "weft_input_loops_total", label, &self.input_loops);
        push_counter(out, "weft_pkts_recv_total", label, &self.pkts_recv);
        push_counter(out, "weft_bytes_recv_total", label, &self.bytes_recv);
        push_counter(out, "weft_input_process_us_total", label, &self.input_process_us);
        push_counter(out, "weft_output_process_us_total", label, &self.output_process_us);
        push_counter(out, "weft_bytes_sent_total", label, &self.bytes_sent);
        push_counter(out, "weft_pkts_sent_total", label, &self.pkts_sent);
    }
}

/// Counters for the processing pipeline as a whole.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub pkts_processed: AtomicU64,
    /// Packets dropped because a hook chain failed.
    pub pkts_dropped_error: AtomicU64,
    /// Packets dropped because no hook resolved a route.
    pub pkts_dropped_unrouted: AtomicU64,
}

/// Registry of per-socket counters plus the pipeline counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    sockets: Mutex<HashMap<String, Arc<SocketMetrics>>>,
    pub pipeline: PipelineMetrics,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for the socket with the given label, created on first use.
    pub fn socket(&self, label: &str) -> Arc<SocketMetrics> {
        let mut sockets = self.lock_sockets();
        Arc::clone(
            sockets
                .entry(label.to_string())
                .or_insert_with(|| Arc::new(SocketMetrics::default())),
        )
    }

    /// Plain-text exposition of every counter, one `name{socket="label"} value`
    /// line per metric, sorted by label for stable output.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let sockets = self.lock_sockets();
        let mut labels: Vec<_> = sockets.keys().cloned().collect();
        labels.sort();
        for label in &labels {
            sockets[label].render(label, &mut out);
        }
        drop(sockets);

        let p = &self.pipeline;
        out.push_str(&format!(
            "weft_pipeline_pkts_processed_total {}\n",
            p.pkts_processed.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "weft_pipeline_pkts_dropped_error_total {}\n",
            p.pkts_dropped_error.load(Ordering::Relaxed)
        ));
        out.push_str(&format!(
            "weft_pipeline_pkts_dropped_unrouted_total {}\n",
            p.pkts_dropped_unrouted.load(Ordering::Relaxed)
        ));
        out
    }

    fn lock_sockets(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<SocketMetrics>>> {
        self.sockets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push_counter(out: &mut String, name: &str, label: &str, val: &AtomicU64) {
    out.push_str(name);
    out.push_str("{socket=\"");
    out.push_str(label);
    out.push_str("\"} ");
    out.push_str(&val.load(Ordering::Relaxed).to_string());
    out.push('\n');
}
