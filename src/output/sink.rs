use std::io::Write;
use std::sync::Mutex;

use chrono::Utc;
use log::debug;

use super::Formatter;
use crate::channel::EventSummary;
use crate::error::{ReadoutError, Result};

/// The single results sink shared by all worker threads.
///
/// The only cross-thread resource in the pipeline: workers own their channels
/// outright and meet only here. Records are formatted outside the lock; the
/// mutex is held just long enough to write one line, so commits stay bounded
/// and never overlap with synthesis or fitting.
pub struct EventSink<W: Write + Send> {
    formatter: Box<dyn Formatter>,
    writer: Mutex<W>,
    committed: Mutex<u64>,
}

impl<W: Write + Send> EventSink<W> {
    /// Wrap a writer, emitting the formatter's header (if any) up front
    pub fn new(mut writer: W, formatter: Box<dyn Formatter>) -> Result<Self> {
        if let Some(header) = formatter.header() {
            writeln!(writer, "# committed {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"))
                .map_err(|e| ReadoutError::Sink(e.to_string()))?;
            writeln!(writer, "{header}").map_err(|e| ReadoutError::Sink(e.to_string()))?;
        }
        Ok(Self {
            formatter,
            writer: Mutex::new(writer),
            committed: Mutex::new(0),
        })
    }

    /// Commit one event's already-computed results
    pub fn commit(&self, summary: &EventSummary) -> Result<()> {
        let line = self.formatter.format(summary);

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ReadoutError::Sink("results sink poisoned".into()))?;
        writeln!(writer, "{line}").map_err(|e| ReadoutError::Sink(e.to_string()))?;
        drop(writer);

        let mut committed = self
            .committed
            .lock()
            .map_err(|_| ReadoutError::Sink("results sink poisoned".into()))?;
        *committed += 1;
        debug!("committed event #{committed}");
        Ok(())
    }

    /// Number of events committed so far
    pub fn committed(&self) -> u64 {
        self.committed.lock().map(|c| *c).unwrap_or(0)
    }

    /// Flush and recover the underlying writer
    pub fn into_inner(self) -> Result<W> {
        let mut writer = self
            .writer
            .into_inner()
            .map_err(|_| ReadoutError::Sink("results sink poisoned".into()))?;
        writer.flush().map_err(|e| ReadoutError::Sink(e.to_string()))?;
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CsvFormatter, JsonFormatter};

    fn summary(n: usize) -> EventSummary {
        EventSummary {
            baseline: 1638.0,
            peak_amplitude: 100.0 + n as f64,
            peak_time_ns: 68.2,
            cfd_ns: 22.7,
            poly_cfd_ns: 11.6,
            charge: 4012.5,
            min_arrival_ns: 10.0,
            mean_arrival_ns: 15.0,
            mean_wavelength_nm: 400.0,
            detection_efficiency: 1.0,
            photon_count: n,
            centroid_mm: None,
            segment: None,
            anode_charge: None,
            saturated: false,
            samples: None,
        }
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let sink = EventSink::new(Vec::new(), Box::new(CsvFormatter)).unwrap();
        sink.commit(&summary(1)).unwrap();
        sink.commit(&summary(2)).unwrap();
        assert_eq!(sink.committed(), 2);

        let bytes = sink.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        // comment line + header + 2 records
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(1).unwrap().starts_with("baseline,"));
    }

    #[test]
    fn test_sink_is_shared_across_threads() {
        let sink = EventSink::new(Vec::new(), Box::new(JsonFormatter)).unwrap();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let sink = &sink;
                scope.spawn(move || {
                    for n in 0..25 {
                        sink.commit(&summary(worker * 25 + n)).unwrap();
                    }
                });
            }
        });
        assert_eq!(sink.committed(), 100);

        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().count(), 100);
        // Every line is intact JSON despite concurrent commits
        for line in text.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }
}
