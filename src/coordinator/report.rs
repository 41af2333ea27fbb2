use serde::Deserialize;

use super::inverter::InverterAddress;
use crate::fronius::value::MEASUREMENT_COUNT;

/// Line format understood by the monitoring server. Both are parsed by
/// existing servers, so the text must not change.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Legacy,
    #[default]
    KeyValue,
}

impl ReportFormat {
    pub fn line(self, v: &[f64; MEASUREMENT_COUNT]) -> String {
        match self {
            Self::Legacy => format!(
                "data 9 {:.0} {:.0} {:.0} {:.0} {:.2} {:.1} {:.2} {:.3} {:.1}",
                v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]
            ),
            Self::KeyValue => format!(
                "inverter watts:{:.0} kwh:{:.1} iac:{:.2} vac:{:.1} hz:{:.3} idc:{:.2} vdc:{:.1}",
                v[0],
                v[1] / 1000.0,
                v[4],
                v[5],
                v[6],
                v[7],
                v[8]
            ),
        }
    }

    /// Sample line sent on every idle period in fake-data mode.
    pub fn fake_line(self) -> &'static str {
        match self {
            Self::Legacy => "data 9 1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0",
            Self::KeyValue => {
                "inverter watts:120 kwh:137000 iac:0.49 vac:245.0 hz:49.990 idc:0.60 vdc:239.0"
            }
        }
    }

    /// Name announced in the logon line.
    pub fn logon_name(self) -> &'static str {
        match self {
            Self::Legacy => "fronius",
            Self::KeyValue => "inverter",
        }
    }
}

/// A finished sweep for one inverter, ready for its server connection.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub address: InverterAddress,
    pub line: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [f64; MEASUREMENT_COUNT] =
        [1234.4, 137_000.0, 12_000.0, 4_500_000.0, 5.126, 241.04, 49.99, 6.004, 312.26];

    #[test]
    fn legacy_line() {
        assert_eq!(
            ReportFormat::Legacy.line(&SAMPLE),
            "data 9 1234 137000 12000 4500000 5.13 241.0 49.99 6.004 312.3"
        );
    }

    #[test]
    fn key_value_line() {
        assert_eq!(
            ReportFormat::KeyValue.line(&SAMPLE),
            "inverter watts:1234 kwh:137.0 iac:5.13 vac:241.0 hz:49.990 idc:6.00 vdc:312.3"
        );
    }

    #[test]
    fn fake_lines() {
        assert!(ReportFormat::Legacy.fake_line().starts_with("data 9 "));
        assert!(ReportFormat::KeyValue.fake_line().starts_with("inverter watts:120 "));
    }
}
