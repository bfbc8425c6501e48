pub mod cobertura;
pub mod istanbul;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UndercovError};
use crate::model::NormalizedCoverage;

/// Report serialization formats, configured per repository as `filetype`.
/// Never auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Istanbul / NYC `coverage-final.json`.
    #[default]
    Json,
    Cobertura,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Cobertura => "cobertura",
        }
    }

    /// The converter for this format.
    pub fn converter(&self) -> &'static dyn Converter {
        match self {
            ReportFormat::Json => &istanbul::IstanbulConverter,
            ReportFormat::Cobertura => &cobertura::CoberturaConverter,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = UndercovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "cobertura" => Ok(ReportFormat::Cobertura),
            _ => Err(UndercovError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every report format converter implements this trait.
pub trait Converter: Send + Sync {
    /// Convert the raw report bytes into the normalized model.
    fn convert(&self, input: &[u8]) -> Result<NormalizedCoverage>;
}

/// A report body as served, tagged with the format it was configured as.
#[derive(Debug, Clone)]
pub struct RawCoverageReport {
    pub format: ReportFormat,
    /// Where the report was fetched from.
    pub url: String,
    pub body: Vec<u8>,
}

/// Convert a fetched report with the converter its format selects.
pub fn convert(raw: &RawCoverageReport) -> Result<NormalizedCoverage> {
    raw.format.converter().convert(&raw.body)
}
