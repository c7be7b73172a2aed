use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use clap::{Args, Parser};

#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "python";
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Parser)]
#[command(
    name = "tk-rad-builder",
    version,
    about = "Visual builder for Tkinter user interfaces"
)]
pub struct Cli {
    /// Project file to open on start.
    pub project: Option<PathBuf>,

    /// Write the generated program for PROJECT to FILE and exit without opening a window.
    #[arg(long, value_name = "FILE", requires = "project")]
    pub export: Option<PathBuf>,

    #[command(flatten)]
    pub settings: Settings,
}

/// How generated programs are run and checked.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct Settings {
    /// Interpreter used for Run and Check.
    #[arg(long = "python", env = "RAD_PYTHON", default_value = DEFAULT_PYTHON)]
    pub python: String,

    /// Give up on a check after this many milliseconds.
    #[arg(long, env = "RAD_VERIFY_TIMEOUT_MS", default_value_t = DEFAULT_VERIFY_TIMEOUT_MS)]
    pub verify_timeout_ms: u64,

    /// Also execute the program during a check, with the Tk main loop disabled.
    #[arg(long, env = "RAD_VERIFY_EXECUTE")]
    pub execute_on_verify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.to_owned(),
            verify_timeout_ms: DEFAULT_VERIFY_TIMEOUT_MS,
            execute_on_verify: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.python.trim().is_empty(), "RAD_PYTHON cannot be empty");
        ensure!(
            self.verify_timeout_ms > 0,
            "RAD_VERIFY_TIMEOUT_MS must be greater than 0"
        );
        Ok(())
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tk-rad-builder"]).unwrap();
        assert_eq!(cli.project, None);
        assert_eq!(cli.export, None);
        assert_eq!(cli.settings.verify_timeout_ms, DEFAULT_VERIFY_TIMEOUT_MS);
        assert!(cli.settings.validate().is_ok());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "tk-rad-builder",
            "demo.json",
            "--export",
            "demo.py",
            "--python",
            "/usr/bin/python3.12",
            "--verify-timeout-ms",
            "250",
            "--execute-on-verify",
        ])
        .unwrap();
        assert_eq!(cli.project, Some(PathBuf::from("demo.json")));
        assert_eq!(cli.export, Some(PathBuf::from("demo.py")));
        assert_eq!(cli.settings.python, "/usr/bin/python3.12");
        assert_eq!(cli.settings.verify_timeout(), Duration::from_millis(250));
        assert!(cli.settings.execute_on_verify);
    }

    #[test]
    fn test_export_requires_project() {
        assert!(Cli::try_parse_from(["tk-rad-builder", "--export", "out.py"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = Settings {
            verify_timeout_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            python: "  ".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
