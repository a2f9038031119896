//! Shell, clock, environment, and host information tools.

use std::process::Stdio;
use std::time::Duration;

use chrono::{Local, Utc};
use serde_json::{Value, json};
use tokio::process::Command;
use tokio::time::timeout;

use super::{Plugin, str_arg};
use crate::declare::ToolBuilder;
use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;
use crate::validation::ParameterRule;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const MAX_COMMAND_TIMEOUT_SECS: u32 = 600;
const SENSITIVE_MARKERS: [&str; 5] = ["token", "key", "secret", "password", "credential"];

/// Host-level tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPlugin;

impl Plugin for SystemPlugin {
    fn name(&self) -> &str {
        "system"
    }

    fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()> {
        ToolBuilder::new("run_shell_command")
            .description("Run a shell command and return stdout, stderr, and the exit code.")
            .param(
                "command",
                ParameterRule::string().description("Shell command to execute"),
            )
            .param(
                "timeout",
                ParameterRule::integer()
                    .range(1, MAX_COMMAND_TIMEOUT_SECS)
                    .default(DEFAULT_COMMAND_TIMEOUT_SECS)
                    .description("Timeout in seconds"),
            )
            .categories(["system", "shell"])
            .requires_filesystem()
            .example("run_shell_command(command=\"ls -la\")")
            .register(registry, run_shell_command)?;

        ToolBuilder::new("get_current_datetime")
            .description("Get the current local and UTC date and time.")
            .categories(["system", "time"])
            .register(registry, |_args: Value| async move { Ok(current_datetime()) })?;

        ToolBuilder::new("get_environment_variable")
            .description("Read an environment variable. Secrets are redacted.")
            .param(
                "variable_name",
                ParameterRule::string()
                    .regex("^[A-Za-z_][A-Za-z0-9_]*$")
                    .description("Variable name"),
            )
            .categories(["system", "env"])
            .register(registry, get_environment_variable)?;

        ToolBuilder::new("get_system_info")
            .description("Get operating system, architecture, and process information.")
            .categories(["system", "info"])
            .register(registry, |_args: Value| async move { Ok(system_info()) })
    }
}

async fn run_shell_command(args: Value) -> ToolResult<Value> {
    let command = str_arg(&args, "command")?;
    let secs = args["timeout"]
        .as_u64()
        .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);

    let child = shell(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| PluginError::execution(format!("error running shell command: {err}")))?;

    let output = timeout(Duration::from_secs(secs), child.wait_with_output())
        .await
        .map_err(|_| PluginError::execution(format!("command timed out after {secs} seconds")))?
        .map_err(|err| PluginError::execution(format!("error running shell command: {err}")))?;

    Ok(json!({
        "stdout": String::from_utf8_lossy(&output.stdout),
        "stderr": String::from_utf8_lossy(&output.stderr),
        "returncode": output.status.code(),
    }))
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn current_datetime() -> Value {
    let now = Local::now();
    let utc = Utc::now();
    json!({
        "local_datetime": now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "utc_datetime": utc.format("%Y-%m-%d %H:%M:%S").to_string(),
        "local_date": now.format("%Y-%m-%d").to_string(),
        "local_time": now.format("%H:%M:%S").to_string(),
        "timezone": now.format("%:z").to_string(),
        "timestamp": utc.timestamp(),
    })
}

#[allow(clippy::unused_async)]
async fn get_environment_variable(args: Value) -> ToolResult<Value> {
    let name = str_arg(&args, "variable_name")?;
    let value = std::env::var_os(name).map(|v| v.to_string_lossy().into_owned());
    Ok(match value {
        Some(_) if is_sensitive(name) => json!({ "name": name, "exists": true, "value": "[REDACTED]" }),
        Some(value) => json!({ "name": name, "exists": true, "value": value }),
        None => json!({ "name": name, "exists": false, "value": null }),
    })
}

fn is_sensitive(name: &str) -> bool {
    let lower = name.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn system_info() -> Value {
    let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let cwd = std::env::current_dir()
        .map(|dir| dir.display().to_string())
        .ok();
    json!({
        "platform": std::env::consts::OS,
        "family": std::env::consts::FAMILY,
        "architecture": std::env::consts::ARCH,
        "logical_cores": cores,
        "process": {
            "pid": std::process::id(),
            "cwd": cwd,
        },
    })
}
