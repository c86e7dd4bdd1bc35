use super::Formatter;
use crate::channel::EventSummary;

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format(&self, summary: &EventSummary) -> String {
        let mut line = format!(
            "amp {:>8.1}  t_peak {:>8.2} ns  cfd {:>8.2} ns  poly {:>8.2} ns  q {:>10.1}  n_ph {:>4}  eff {:.3}",
            summary.peak_amplitude,
            summary.peak_time_ns,
            summary.cfd_ns,
            summary.poly_cfd_ns,
            summary.charge,
            summary.photon_count,
            summary.detection_efficiency,
        );
        if let Some((col, row)) = summary.segment {
            line.push_str(&format!("  seg ({col},{row})"));
        }
        if summary.saturated {
            line.push_str("  SATURATED");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> EventSummary {
        EventSummary {
            baseline: 1638.0,
            peak_amplitude: 333.4,
            peak_time_ns: 68.2,
            cfd_ns: 22.7,
            poly_cfd_ns: 11.6,
            charge: 4012.5,
            min_arrival_ns: 10.0,
            mean_arrival_ns: 15.0,
            mean_wavelength_nm: 400.0,
            detection_efficiency: 1.0,
            photon_count: 3,
            centroid_mm: None,
            segment: Some((1, 0)),
            anode_charge: None,
            saturated: true,
            samples: None,
        }
    }

    #[test]
    fn test_text_format() {
        let line = TextFormatter.format(&summary());
        assert!(line.contains("seg (1,0)"));
        assert!(line.contains("SATURATED"));
        assert!(line.contains("n_ph    3"));
    }
}
