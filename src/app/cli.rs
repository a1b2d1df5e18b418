//! Command-line arguments
//!
//! Everything here overrides the corresponding configuration file value;
//! the file supplies the defaults.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "herald")]
#[command(about = "Topic and filter based notification broker")]
#[command(version)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Delivery mode override
    #[arg(short = 'd', long = "delivery-mode", value_name = "MODE", value_parser = ["serial", "parallel", "fixed-parallel"])]
    pub delivery_mode: Option<String>,

    /// Drop all pending batches before starting delivery
    #[arg(long = "purge")]
    pub purge: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "json"])]
    pub log_format: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from([
            "herald",
            "-c",
            "/etc/herald.toml",
            "--delivery-mode",
            "serial",
            "--purge",
            "-l",
            "debug",
        ]);
        assert_eq!(args.config_file, Some(PathBuf::from("/etc/herald.toml")));
        assert_eq!(args.delivery_mode.as_deref(), Some("serial"));
        assert!(args.purge);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_unknown_delivery_mode_rejected() {
        assert!(Args::try_parse_from(["herald", "--delivery-mode", "bogus"]).is_err());
    }
}
