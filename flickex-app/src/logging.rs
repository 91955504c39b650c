use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming};
use std::path::Path;

/// Starts the global logger. The returned handle must outlive the run so
/// buffered file output gets flushed.
pub fn setup_logging(level: &str, dir: Option<&Path>) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_str(level)?;
    let logger = match dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename("flickex"))
            .duplicate_to_stderr(Duplicate::All)
            .rotate(
                Criterion::Size(4 * 1024 * 1024),
                Naming::Timestamps,
                Cleanup::KeepLogFiles(10),
            ),
        None => logger.log_to_stderr(),
    };
    logger.format(flexi_logger::detailed_format).start()
}
