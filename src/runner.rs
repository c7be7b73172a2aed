//! Runs generated programs in a separate interpreter process.
//!
//! The editor never executes user code itself. `run_detached` starts the program and
//! forgets about it; `verify` compiles (and optionally executes) it in a throwaway
//! interpreter and reads a one-line JSON report back.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::RunError;

/// `CREATE_NEW_CONSOLE`: give the program its own console window.
#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Reads the program at argv[1]; argv[2] == "1" also executes it.
/// The last line on stdout is the report.
const HARNESS: &str = r#"
import json, sys

def report(**fields):
    sys.stdout.write("\n" + json.dumps(fields) + "\n")
    sys.stdout.flush()

path, execute = sys.argv[1], sys.argv[2] == "1"
with open(path, encoding="utf-8") as f:
    source = f.read()

try:
    code = compile(source, "<generated>", "exec")
except SyntaxError as e:
    report(status="fault", kind="syntax", name=type(e).__name__, line=e.lineno,
           column=e.offset, message=str(e.msg), text=(e.text or "").strip())
    sys.exit(0)

if execute:
    try:
        import tkinter
        tkinter.Misc.mainloop = lambda self, n=0: None
        tkinter.mainloop = lambda n=0: None
        exec(code, {"__name__": "__main__", "__builtins__": __builtins__})
    except SystemExit:
        pass
    except BaseException as e:
        line, tb = None, e.__traceback__
        while tb is not None:
            if tb.tb_frame.f_code.co_filename == "<generated>":
                line = tb.tb_lineno
            tb = tb.tb_next
        report(status="fault", kind="runtime", name=type(e).__name__, line=line,
               column=None, message=str(e), text=None)
        sys.exit(0)

report(status="passed")
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FaultKind {
    Syntax,
    Runtime,
}

/// A problem found by a check, located in the generated text where possible.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub(crate) struct Fault {
    pub(crate) kind: FaultKind,
    /// Python exception class, e.g. `SyntaxError` or `NameError`.
    pub(crate) name: String,
    pub(crate) line: Option<u32>,
    pub(crate) column: Option<u32>,
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " on line {line}, column {column}")?,
            (Some(line), None) => write!(f, " on line {line}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)?;
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "\n{text}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Verification {
    Passed { at: DateTime<Local> },
    Fault(Fault),
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Report {
    Passed,
    Fault(Fault),
}

/// Turn the harness output into a verdict.
fn parse_report(stdout: &str, stderr: &str) -> Result<Verification, RunError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default();
    match serde_json::from_str::<Report>(line) {
        Ok(Report::Passed) => Ok(Verification::Passed { at: Local::now() }),
        Ok(Report::Fault(fault)) => Ok(Verification::Fault(fault)),
        Err(e) => {
            let detail = match stderr.trim() {
                "" => e.to_string(),
                stderr => stderr.to_owned(),
            };
            Err(RunError::Report(detail))
        }
    }
}

fn temp_program_path() -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "tk_rad_builder_{}_{now_ns}.py",
        std::process::id()
    ))
}

fn write_program(source: &str) -> Result<PathBuf, RunError> {
    let path = temp_program_path();
    std::fs::write(&path, source)?;
    Ok(path)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[derive(Clone, Debug)]
pub(crate) struct Runner {
    python: String,
    timeout: Duration,
    execute: bool,
}

impl Runner {
    pub(crate) fn new(settings: &Settings) -> Self {
        Self {
            python: settings.python.clone(),
            timeout: settings.verify_timeout(),
            execute: settings.execute_on_verify,
        }
    }

    /// Whether a check also executes the program.
    pub(crate) fn executes(&self) -> bool {
        self.execute
    }

    fn launch_error(&self, source: std::io::Error) -> RunError {
        RunError::Launch {
            python: self.python.clone(),
            source,
        }
    }

    /// Start the program in its own process and return its pid.
    pub(crate) fn run_detached(&self, source: &str) -> Result<u32, RunError> {
        let path = write_program(source)?;
        let mut command = Command::new(&self.python);
        command.arg(&path);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NEW_CONSOLE);
        }
        let mut child = command.spawn().map_err(|e| self.launch_error(e))?;
        let pid = child.id();
        info!(pid, path = %path.display(), "program started");
        // Reap it when it exits
        thread::spawn(move || {
            if let Ok(status) = child.wait() {
                debug!(pid, %status, "program exited");
            }
        });
        Ok(pid)
    }

    /// Check the program in a disposable interpreter, bounded by the configured timeout.
    pub(crate) fn verify(&self, source: &str) -> Result<Verification, RunError> {
        let path = write_program(source)?;
        let result = self.verify_file(&path);
        let _ = std::fs::remove_file(&path);
        match &result {
            Ok(Verification::Passed { .. }) => info!("check passed"),
            Ok(Verification::Fault(fault)) => info!(%fault, "check found a fault"),
            Err(e) => warn!(error = %e, "check failed to run"),
        }
        result
    }

    fn verify_file(&self, path: &Path) -> Result<Verification, RunError> {
        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(HARNESS)
            .arg(path)
            .arg(if self.execute { "1" } else { "0" })
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        self.wait_with_deadline(&mut child)?;

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        parse_report(&stdout, &stderr)
    }

    fn wait_with_deadline(&self, child: &mut Child) -> Result<(), RunError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Timeout(self.timeout.as_millis() as u64));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{self, GenInput};
    use crate::model::Canvas;

    fn runner(execute: bool, timeout_ms: u64) -> Option<Runner> {
        let settings = Settings {
            execute_on_verify: execute,
            verify_timeout_ms: timeout_ms,
            ..Settings::default()
        };
        // Skip when no interpreter is installed
        let available = Command::new(&settings.python)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        available.then(|| Runner::new(&settings))
    }

    #[test]
    fn test_parse_report_passed() {
        let out = "some program output\n\n{\"status\": \"passed\"}\n";
        assert!(matches!(
            parse_report(out, ""),
            Ok(Verification::Passed { .. })
        ));
    }

    #[test]
    fn test_parse_report_syntax_fault() {
        let out = r#"{"status": "fault", "kind": "syntax", "name": "SyntaxError", "line": 3, "column": 7, "message": "invalid syntax", "text": "x = = 1"}"#;
        let Ok(Verification::Fault(fault)) = parse_report(out, "") else {
            panic!("expected a fault");
        };
        assert_eq!(fault.kind, FaultKind::Syntax);
        assert_eq!((fault.line, fault.column), (Some(3), Some(7)));
        assert_eq!(
            fault.to_string(),
            "SyntaxError on line 3, column 7: invalid syntax\nx = = 1"
        );
    }

    #[test]
    fn test_parse_report_runtime_fault() {
        let out = r#"{"status": "fault", "kind": "runtime", "name": "NameError", "line": 12, "column": null, "message": "name 'x' is not defined", "text": null}"#;
        let Ok(Verification::Fault(fault)) = parse_report(out, "") else {
            panic!("expected a fault");
        };
        assert_eq!(fault.kind, FaultKind::Runtime);
        assert_eq!(fault.to_string(), "NameError on line 12: name 'x' is not defined");
    }

    #[test]
    fn test_parse_report_garbage_uses_stderr() {
        let err = parse_report("", "Traceback: boom").unwrap_err();
        assert!(matches!(err, RunError::Report(ref s) if s == "Traceback: boom"));
        assert!(matches!(parse_report("nope", ""), Err(RunError::Report(_))));
    }

    #[test]
    fn test_missing_interpreter_is_launch_error() {
        let runner = Runner::new(&Settings {
            python: "definitely-not-a-python-interpreter".into(),
            ..Settings::default()
        });
        assert!(matches!(
            runner.verify("x = 1\n"),
            Err(RunError::Launch { .. })
        ));
    }

    #[test]
    fn test_verify_generated_program_compiles() {
        let Some(runner) = runner(false, 10_000) else {
            return;
        };
        let source = codegen::generate(&GenInput {
            elements: &Default::default(),
            canvas: &Canvas::default(),
            custom_code: "",
            handlers: &Default::default(),
        });
        assert!(matches!(
            runner.verify(&source),
            Ok(Verification::Passed { .. })
        ));
    }

    #[test]
    fn test_verify_reports_syntax_error_location() {
        let Some(runner) = runner(false, 10_000) else {
            return;
        };
        let Ok(Verification::Fault(fault)) = runner.verify("x = 1\ndef broken(:\n    pass\n") else {
            panic!("expected a fault");
        };
        assert_eq!(fault.kind, FaultKind::Syntax);
        assert_eq!(fault.line, Some(2));
    }

    #[test]
    fn test_verify_reports_runtime_error_line() {
        let Some(runner) = runner(true, 10_000) else {
            return;
        };
        let Ok(Verification::Fault(fault)) = runner.verify("a = 1\nb = undefined_name\n") else {
            panic!("expected a fault");
        };
        assert_eq!(fault.kind, FaultKind::Runtime);
        assert_eq!(fault.name, "NameError");
        assert_eq!(fault.line, Some(2));
    }

    #[test]
    fn test_verify_times_out() {
        let Some(runner) = runner(true, 200) else {
            return;
        };
        assert!(matches!(
            runner.verify("import time\ntime.sleep(30)\n"),
            Err(RunError::Timeout(200))
        ));
    }
}
