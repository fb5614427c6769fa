//! Periodic shipment of collected QoS reports.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::qos::report::QosReportCollector;

/// Drains a [`QosReportCollector`] on a fixed interval and ships each
/// non-empty report, already encoded, to the transport layer through a
/// channel. Producers keep adding to the collector and never block on the
/// shipping path.
pub struct QosReportForwarder {
    collector: Arc<QosReportCollector>,
    interval: Duration,
    reports: Sender<Vec<u8>>,
}

impl QosReportForwarder {
    pub fn new(
        collector: Arc<QosReportCollector>,
        interval: Duration,
        reports: Sender<Vec<u8>>,
    ) -> Self {
        Self {
            collector,
            interval,
            reports,
        }
    }

    /// Run the drain loop until the shutdown channel signals or disconnects.
    /// A final drain ships whatever the last interval accumulated.
    pub fn run(&self, shutdown: Receiver<()>) {
        loop {
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !self.ship_drained() {
                        return;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    self.ship_drained();
                    return;
                }
            }
        }
    }

    /// Spawn the loop on its own thread. Dropping or signalling the returned
    /// sender stops the forwarder.
    pub fn spawn(self) -> (Sender<()>, JoinHandle<()>) {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let handle = std::thread::spawn(move || self.run(shutdown_rx));
        (shutdown_tx, handle)
    }

    fn ship_drained(&self) -> bool {
        let report = self.collector.drain();
        if report.is_empty() {
            return true;
        }
        if self.reports.send(report.encode()).is_err() {
            tracing::warn!("qos report channel closed, stopping forwarder");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::records::EdgeLatency;
    use crate::qos::report::QosReport;
    use crate::qos::reporter_id::EdgeReporterId;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_forwarder_ships_non_empty_reports_and_stops() {
        let collector = Arc::new(QosReportCollector::new());
        let (report_tx, report_rx) = unbounded();
        let forwarder = QosReportForwarder::new(
            Arc::clone(&collector),
            Duration::from_millis(10),
            report_tx,
        );

        let id = EdgeReporterId::new(0, 0, 1, 0);
        collector.add_edge_latency(EdgeLatency::new(id, 2.5));

        let (shutdown, handle) = forwarder.spawn();

        let encoded = report_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no report shipped");
        let report = QosReport::decode(&encoded).unwrap();
        let latencies: Vec<_> = report.edge_latencies().collect();
        assert_eq!(latencies.len(), 1);
        assert_eq!(latencies[0].latency_ms(), 2.5);

        drop(shutdown);
        handle.join().unwrap();

        // Empty intervals ship nothing.
        assert!(report_rx.try_recv().is_err());
    }
}
