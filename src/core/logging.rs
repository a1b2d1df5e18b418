//! Logging initialisation built on flexi_logger

// Keeps the logger alive for the process lifetime
static LOGGER_HANDLE: std::sync::OnceLock<flexi_logger::LoggerHandle> = std::sync::OnceLock::new();

/// Initialise logging with an optional level spec, format ("text"/"json")
/// and log file path
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    use flexi_logger::{FileSpec, Logger};

    let level_str = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level_str)?;

    logger = match log_format.unwrap_or("text") {
        "json" => logger.format(json_format),
        _ => logger.format(simple_format),
    };

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(handle);

    Ok(())
}

// Plain text format: "YYYY-MM-DD HH:mm:ss.fff INF message"
fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let level_abbr = match record.level() {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    };

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr,
        record.args()
    )
}

// One JSON object per line, for log shippers
fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut flexi_logger::DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let entry = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        "level": record.level().to_string(),
        "target": record.target(),
        "message": record.args().to_string(),
    });
    write!(w, "{entry}")
}
