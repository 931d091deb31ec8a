//! PVserv measurement file parsing
//!
//! Electrical measurements arrive as plain-text exports from the PVserv
//! bench, one module per line:
//!
//! ```text
//! LAB/HP 31500/Mod 6298 S.Nr.: 23.44.1286 Nr. 1 FF 0,957 Rds 17,20 Uf 772 bright U I 212 0,00 339 0,00
//! ```
//!
//! Decimal separators are commas. `FF` is the fill factor, `Rds` the series
//! resistance in ohms, `Uf` the forward voltage; `bright`/`dark` marks the
//! measurement kind and the trailing numbers are I-V curve pairs.

use serde::Serialize;

/// Bright or dark I-V measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKind {
    Bright,
    Dark,
}

/// One parsed module measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Module number on the bench (the `Nr.` field)
    pub module_nr: u32,
    /// Serial number when present (the `S.Nr.:` field)
    pub serial: Option<String>,
    pub kind: MeasureKind,
    /// Fill factor (0..=1 for a plausible measurement)
    pub ff: f64,
    /// Series resistance in ohms
    pub rds_ohm: f64,
    /// Forward voltage in volts
    pub uf_v: f64,
    /// Raw I-V curve points (voltage, current)
    pub iv_points: Vec<(f64, f64)>,
}

impl Measurement {
    /// Plausibility check: fill factor in (0, 1] and positive voltage
    pub fn is_valid(&self) -> bool {
        self.ff > 0.0 && self.ff <= 1.0 && self.uf_v > 0.0
    }
}

/// One unparseable line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    /// 1-indexed line number
    pub line: usize,
    pub message: String,
}

/// Aggregate numbers over a parsed file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureSummary {
    pub total: usize,
    pub bright: usize,
    pub dark: usize,
    pub valid: usize,
    /// Mean fill factor over valid measurements, three decimals
    pub average_ff: f64,
}

/// Full parse result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub measurements: Vec<Measurement>,
    pub errors: Vec<ParseError>,
    pub summary: MeasureSummary,
}

/// Parse a PVserv text export
///
/// Blank lines are skipped; lines that do not carry a measurement are
/// reported in `errors` with their line number, never silently dropped.
pub fn parse_pvserv(content: &str) -> ParseOutcome {
    let mut measurements = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(measurement) => measurements.push(measurement),
            Err(message) => errors.push(ParseError { line: idx + 1, message }),
        }
    }

    let summary = summarize(&measurements);
    ParseOutcome { measurements, errors, summary }
}

fn summarize(measurements: &[Measurement]) -> MeasureSummary {
    let valid: Vec<&Measurement> = measurements.iter().filter(|m| m.is_valid()).collect();
    let average_ff = if valid.is_empty() {
        0.0
    } else {
        let sum: f64 = valid.iter().map(|m| m.ff).sum();
        ((sum / valid.len() as f64) * 1000.0).round() / 1000.0
    };

    MeasureSummary {
        total: measurements.len(),
        bright: measurements.iter().filter(|m| m.kind == MeasureKind::Bright).count(),
        dark: measurements.iter().filter(|m| m.kind == MeasureKind::Dark).count(),
        valid: valid.len(),
        average_ff,
    }
}

fn parse_line(line: &str) -> Result<Measurement, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let module_nr = field_after(&tokens, "Nr.")
        .ok_or_else(|| "Missing module number (Nr.)".to_string())?
        .parse::<u32>()
        .map_err(|_| "Module number is not an integer".to_string())?;

    let serial = field_after(&tokens, "S.Nr.:").map(|s| s.to_string());

    let ff = decimal_after(&tokens, "FF").ok_or_else(|| "Missing fill factor (FF)".to_string())?;
    let rds_ohm = decimal_after(&tokens, "Rds").ok_or_else(|| "Missing Rds".to_string())?;
    let uf_v = decimal_after(&tokens, "Uf").ok_or_else(|| "Missing Uf".to_string())?;

    let kind = if tokens.iter().any(|t| t.eq_ignore_ascii_case("bright")) {
        MeasureKind::Bright
    } else if tokens.iter().any(|t| t.eq_ignore_ascii_case("dark")) {
        MeasureKind::Dark
    } else {
        return Err("Missing measurement kind (bright/dark)".to_string());
    };

    // I-V pairs follow the "U I" marker to the end of the line
    let iv_points = tokens
        .windows(2)
        .position(|w| w[0] == "U" && w[1] == "I")
        .map(|marker| {
            let values: Vec<f64> = tokens[marker + 2..]
                .iter()
                .filter_map(|t| parse_decimal(t))
                .collect();
            values.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
        })
        .unwrap_or_default();

    Ok(Measurement { module_nr, serial, kind, ff, rds_ohm, uf_v, iv_points })
}

/// Token immediately following a marker token
fn field_after<'a>(tokens: &[&'a str], marker: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| *t == marker)
        .and_then(|i| tokens.get(i + 1))
        .copied()
}

fn decimal_after(tokens: &[&str], marker: &str) -> Option<f64> {
    field_after(tokens, marker).and_then(parse_decimal)
}

/// Parse a number with either comma or point as decimal separator
fn parse_decimal(token: &str) -> Option<f64> {
    token.replace(',', ".").parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str =
        "LAB/HP 31500/Mod 6298 S.Nr.: 23.44.1286 Nr. 1 FF 0,957 Rds 17,20 Uf 772 bright U I 212 0,00 339 0,00";

    #[test]
    fn test_parse_reference_line() {
        let m = parse_line(SAMPLE_LINE).unwrap();
        assert_eq!(m.module_nr, 1);
        assert_eq!(m.serial.as_deref(), Some("23.44.1286"));
        assert_eq!(m.kind, MeasureKind::Bright);
        assert!((m.ff - 0.957).abs() < 1e-9);
        assert!((m.rds_ohm - 17.20).abs() < 1e-9);
        assert!((m.uf_v - 772.0).abs() < 1e-9);
        assert_eq!(m.iv_points, vec![(212.0, 0.0), (339.0, 0.0)]);
        assert!(m.is_valid());
    }

    #[test]
    fn test_parse_dark_measurement() {
        let line = "LAB/HP 31500/Mod 6298 Nr. 7 FF 0,831 Rds 22,05 Uf 768 dark U I 100 0,01";
        let m = parse_line(line).unwrap();
        assert_eq!(m.module_nr, 7);
        assert_eq!(m.serial, None);
        assert_eq!(m.kind, MeasureKind::Dark);
    }

    #[test]
    fn test_file_with_garbage_lines_reports_errors() {
        let content = format!("{}\n\nPVserv session started 14:02\n{}\n", SAMPLE_LINE,
            "LAB/HP 31500/Mod 6298 Nr. 2 FF 0,940 Rds 18,00 Uf 770 bright U I 200 0,00");

        let outcome = parse_pvserv(&content);
        assert_eq!(outcome.measurements.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, 3);
    }

    #[test]
    fn test_summary_counts_and_average() {
        let content = format!(
            "{}\n{}\n{}\n",
            "LAB Nr. 1 FF 0,900 Rds 17,00 Uf 772 bright U I",
            "LAB Nr. 2 FF 0,950 Rds 17,50 Uf 770 bright U I",
            "LAB Nr. 3 FF 0,850 Rds 19,00 Uf 765 dark U I",
        );

        let outcome = parse_pvserv(&content);
        assert_eq!(outcome.summary.total, 3);
        assert_eq!(outcome.summary.bright, 2);
        assert_eq!(outcome.summary.dark, 1);
        assert_eq!(outcome.summary.valid, 3);
        assert!((outcome.summary.average_ff - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_implausible_ff_not_counted_valid() {
        let line = "LAB Nr. 4 FF 1,200 Rds 17,00 Uf 772 bright U I";
        let outcome = parse_pvserv(line);
        assert_eq!(outcome.summary.total, 1);
        assert_eq!(outcome.summary.valid, 0);
        assert_eq!(outcome.summary.average_ff, 0.0);
    }

    #[test]
    fn test_odd_iv_value_count_drops_trailing_value() {
        let line = "LAB Nr. 5 FF 0,900 Rds 17,00 Uf 772 bright U I 212 0,00 339";
        let m = parse_line(line).unwrap();
        assert_eq!(m.iv_points, vec![(212.0, 0.0)]);
    }
}
