use super::Formatter;
use crate::channel::EventSummary;

pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format(&self, summary: &EventSummary) -> String {
        let (col, row) = summary
            .segment
            .map(|(c, r)| (c as i64, r as i64))
            .unwrap_or((-1, -1));
        let centroid = summary.centroid_mm.unwrap_or([f64::NAN; 3]);
        let anodes = summary.anode_charge.unwrap_or([f64::NAN; 4]);
        format!(
            "{:.3},{:.3},{:.4},{:.4},{:.4},{:.3},{:.4},{:.4},{:.2},{:.6},{},{:.4},{:.4},{:.4},{},{},{:.5},{:.5},{:.5},{:.5},{}",
            summary.baseline,
            summary.peak_amplitude,
            summary.peak_time_ns,
            summary.cfd_ns,
            summary.poly_cfd_ns,
            summary.charge,
            summary.min_arrival_ns,
            summary.mean_arrival_ns,
            summary.mean_wavelength_nm,
            summary.detection_efficiency,
            summary.photon_count,
            centroid[0],
            centroid[1],
            centroid[2],
            col,
            row,
            anodes[0],
            anodes[1],
            anodes[2],
            anodes[3],
            summary.saturated as u8,
        )
    }

    fn header(&self) -> Option<String> {
        Some(
            "baseline,peak_amplitude,peak_time_ns,cfd_ns,poly_cfd_ns,charge,\
             min_arrival_ns,mean_arrival_ns,mean_wavelength_nm,detection_efficiency,\
             photon_count,centroid_x_mm,centroid_y_mm,centroid_z_mm,segment_col,\
             segment_row,anode_0,anode_1,anode_2,anode_3,saturated"
                .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_column_count_matches_header() {
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
            detection_efficiency: 0.75,
            photon_count: 4,
            centroid_mm: Some([1.0, 2.0, 0.0]),
            segment: Some((0, 1)),
            anode_charge: Some([0.1, 0.2, 0.3, 0.4]),
            saturated: false,
            samples: None,
        };
        let formatter = CsvFormatter;
        let header_cols = formatter.header().unwrap().split(',').count();
        let line_cols = formatter.format(&summary).split(',').count();
        assert_eq!(header_cols, line_cols);
    }
}
