//! Preprocessing through external commands.
//!
//! The command runs under `tokio::process` on a current-thread runtime owned
//! by the call, with the source fed to stdin while stdout and stderr are
//! drained, so neither side can stall on a full pipe.

use std::io::ErrorKind;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Preprocessor, SourceSyntax};
use crate::core::CompilationError;

/// Runs `lessc`/`sass`-style commands that read a source on stdin and write
/// CSS to stdout.
///
/// A syntax without a configured command is passed through unchanged.
///
/// ```rust,no_run
/// use pagelib::preprocessor::{CommandPreprocessor, Preprocessor, SourceSyntax};
///
/// let preprocessor = CommandPreprocessor::new(Some(vec!["lessc".into(), "-".into()]), None);
/// let css = preprocessor.compile("@c: red; a { color: @c; }", "/apps/lib/a.less", SourceSyntax::Less);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandPreprocessor {
    less_command: Option<Vec<String>>,
    sass_command: Option<Vec<String>>,
}

impl CommandPreprocessor {
    /// Create a preprocessor from explicit command lines.
    pub fn new(less_command: Option<Vec<String>>, sass_command: Option<Vec<String>>) -> Self {
        Self {
            less_command: less_command.filter(|c| !c.is_empty()),
            sass_command: sass_command.filter(|c| !c.is_empty()),
        }
    }

    /// Look for `lessc` and `sass` on `PATH`.
    pub fn detect() -> Self {
        Self::default().or_detected()
    }

    /// Fill syntaxes that have no command with `lessc`/`sass` from `PATH`.
    #[must_use]
    pub fn or_detected(mut self) -> Self {
        if self.less_command.is_none() {
            self.less_command = which::which("lessc")
                .ok()
                .map(|path| vec![path.display().to_string(), "-".to_string()]);
        }
        if self.sass_command.is_none() {
            self.sass_command = which::which("sass")
                .ok()
                .map(|path| vec![path.display().to_string(), "--stdin".to_string()]);
        }
        tracing::debug!(
            target: "preprocessor",
            "Preprocessors after PATH lookup: less={:?} sass={:?}",
            self.less_command,
            self.sass_command
        );
        self
    }

    /// Whether a command is configured for `syntax`.
    pub fn supports(&self, syntax: SourceSyntax) -> bool {
        self.command_for(syntax).is_some()
    }

    fn command_for(&self, syntax: SourceSyntax) -> Option<&[String]> {
        match syntax {
            SourceSyntax::Plain => None,
            SourceSyntax::Less => self.less_command.as_deref(),
            SourceSyntax::Sass => self.sass_command.as_deref(),
        }
    }
}

impl Preprocessor for CommandPreprocessor {
    fn compile(
        &self,
        source: &str,
        origin: &str,
        syntax: SourceSyntax,
    ) -> Result<String, CompilationError> {
        let Some((program, args)) = self.command_for(syntax).and_then(<[String]>::split_first)
        else {
            if syntax.needs_preprocessing() {
                tracing::warn!(
                    target: "preprocessor",
                    "No {} preprocessor configured, including {} unprocessed",
                    syntax,
                    origin
                );
            }
            return Ok(source.to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args);
        if syntax == SourceSyntax::Sass && origin.to_lowercase().ends_with(".sass") {
            cmd.arg("--indented");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            target: "preprocessor",
            "Compiling {} with {} {}",
            origin,
            program,
            args.join(" ")
        );

        let output = run(cmd, source).map_err(|e| {
            CompilationError::new(format!("Failed to run {program}: {e}")).with_origin(origin)
        })?;

        if output.status.success() {
            return String::from_utf8(output.stdout).map_err(|e| {
                CompilationError::new(format!("{program} produced invalid UTF-8: {e}"))
                    .with_origin(origin)
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(target: "preprocessor", "{} failed: {}", program, stderr);
        Err(parse_failure(&stderr, origin, output.status.code()))
    }
}

/// Spawn `cmd`, write `source` to its stdin and collect its output.
///
/// A child that exits without reading all of its input is not an error here;
/// its exit status decides.
fn run(mut cmd: Command, source: &str) -> std::io::Result<Output> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async move {
        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(source.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        match fed {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
            _ => Ok(output),
        }
    })
}

/// Turn preprocessor stderr into a [`CompilationError`].
///
/// The first non-empty line is the message; a trailing `on line N, column M`
/// supplies the position and the remaining lines become the extract.
fn parse_failure(stderr: &str, origin: &str, code: Option<i32>) -> CompilationError {
    let mut lines = stderr.lines().map(str::trim_end).filter(|l| !l.trim().is_empty());
    let first = lines.next().map(str::trim);

    let Some(first) = first else {
        let status = code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
        return CompilationError::new(format!("Preprocessor exited with {status}"))
            .with_origin(origin);
    };

    let (message, position) = match first.rfind(" on line ") {
        Some(idx) => (first[..idx].trim(), parse_position(&first[idx + " on line ".len()..])),
        None => (first, None),
    };

    let mut error = CompilationError::new(message).with_origin(origin);
    if let Some((line, column)) = position {
        error = error.at(line, column);
    }
    let extract: Vec<&str> = lines.collect();
    if !extract.is_empty() {
        error = error.with_extract(extract.join("\n"));
    }
    error
}

fn parse_position(text: &str) -> Option<(usize, usize)> {
    let (line, rest) = text.split_once(',')?;
    let column = rest.trim().strip_prefix("column")?.trim();
    let column: String = column.chars().take_while(char::is_ascii_digit).collect();
    Some((line.trim().parse().ok()?, column.parse().ok()?))
}
