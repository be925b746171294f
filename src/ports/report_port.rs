//! Report generation port.

use crate::domain::error::ArimaTraderError;
use crate::domain::report::ReportContext;

/// Port for writing backtest reports.
pub trait ReportPort {
    /// Render the report to a string.
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, ArimaTraderError>;

    /// Render and write to `output_path`, creating parent directories.
    fn write(&self, ctx: &ReportContext<'_>, output_path: &str) -> Result<(), ArimaTraderError> {
        let content = self.render(ctx)?;
        let path = std::path::Path::new(output_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
