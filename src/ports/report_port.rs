//! Report output port.

use std::path::Path;

use crate::domain::error::PatternIqError;
use crate::domain::report::Report;

pub trait ReportPort {
    fn write(&self, report: &Report, output_path: &Path) -> Result<(), PatternIqError>;
}
