use super::Formatter;
use crate::channel::EventSummary;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, summary: &EventSummary) -> String {
        serde_json::to_string(summary).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trips_fields() {
        let summary = EventSummary {
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
            segment: None,
            anode_charge: None,
            saturated: false,
            samples: Some(vec![1, 2, 3]),
        };
        let line = JsonFormatter.format(&summary);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["photon_count"], 3);
        assert_eq!(value["samples"][2], 3);
    }
}
