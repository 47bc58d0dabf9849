//! External tool commands and the runner that executes them.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ToolError};
use crate::stage::Stage;

/// Placeholder names accepted in tool arguments
pub const PLACEHOLDERS: [&str; 9] = [
    "geo",
    "msh",
    "input",
    "prefix",
    "width_ratio",
    "thickness_ratio",
    "volume_fraction",
    "workdir",
    "row",
];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A configured external tool: program plus argument templates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the tool after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Write stdout/stderr to `<stage>.log` in the row workspace
    #[serde(default)]
    pub capture: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            timeout_secs: None,
            capture: false,
        }
    }

    /// Check the program and every placeholder against [`PLACEHOLDERS`]
    pub fn check(&self, tool: &str) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram {
                tool: tool.to_string(),
            });
        }
        let vars = Placeholders::all_blank();
        substitute(&self.program, &vars, tool)?;
        for arg in &self.args {
            substitute(arg, &vars, tool)?;
        }
        Ok(())
    }

    /// Resolve the templates for one stage of one row
    pub fn invocation(
        &self,
        tool: &str,
        stage: Stage,
        vars: &Placeholders,
        workdir: &Path,
    ) -> Result<ToolInvocation, ConfigError> {
        let args = self
            .args
            .iter()
            .map(|arg| substitute(arg, vars, tool))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ToolInvocation {
            stage,
            program: substitute(&self.program, vars, tool)?,
            args,
            workdir: workdir.to_path_buf(),
            timeout: self.timeout_secs.map(Duration::from_secs),
            log_file: self
                .capture
                .then(|| workdir.join(format!("{}.log", stage.as_str()))),
        })
    }
}

/// Values substituted for `{name}` in tool arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placeholders {
    values: BTreeMap<&'static str, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known placeholder bound to an empty string
    pub fn all_blank() -> Self {
        let mut vars = Self::new();
        for name in PLACEHOLDERS {
            vars.set(name, "");
        }
        vars
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Replace `{name}` occurrences; `{{` and `}}` stand for literal braces
pub fn substitute(template: &str, vars: &Placeholders, tool: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let Some(end) = body.find('}') else {
                return Err(ConfigError::UnclosedPlaceholder {
                    tool: tool.to_string(),
                    arg: template.to_string(),
                });
            };
            let name = &body[..end];
            let value = vars.get(name).ok_or_else(|| ConfigError::UnknownPlaceholder {
                tool: tool.to_string(),
                name: name.to_string(),
            })?;
            out.push_str(value);
            rest = &body[end + 1..];
        } else {
            // lone '}'
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// A fully resolved tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub timeout: Option<Duration>,
    pub log_file: Option<PathBuf>,
}

impl ToolInvocation {
    /// Program and arguments as one shell-like line, for logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs external tools
pub trait ToolRunner: Send + Sync {
    /// Run to completion; `Ok` only on a zero exit status
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        (**self).run(invocation)
    }
}

/// Runs tools as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        let program = invocation.program.clone();
        debug!(
            "[{}] {} (in {})",
            invocation.stage,
            invocation.command_line(),
            invocation.workdir.display()
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null());

        match &invocation.log_file {
            Some(path) => {
                let log_err = |source| ToolError::Log {
                    path: path.clone(),
                    source,
                };
                let stdout = File::create(path).map_err(log_err)?;
                let stderr = stdout.try_clone().map_err(log_err)?;
                cmd.stdout(stdout).stderr(stderr);
            }
            None => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = cmd.spawn().map_err(|source| ToolError::Launch {
            program: program.clone(),
            source,
        })?;

        let status = match invocation.timeout {
            Some(limit) => wait_with_timeout(&mut child, limit, &program)?,
            None => child.wait().map_err(|source| ToolError::Wait {
                program: program.clone(),
                source,
            })?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::ExitStatus {
                program,
                code: status.code(),
            })
        }
    }
}

fn wait_with_timeout(
    child: &mut Child,
    limit: Duration,
    program: &str,
) -> Result<ExitStatus, ToolError> {
    let wait_err = |source| ToolError::Wait {
        program: program.to_string(),
        source,
    };
    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait().map_err(wait_err)? {
            return Ok(status);
        }
        let elapsed = start.elapsed();
        if elapsed >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program: program.to_string(),
                seconds: elapsed.as_secs_f64(),
            });
        }
        thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}
