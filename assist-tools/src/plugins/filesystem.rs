//! File and directory tools.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde_json::{Value, json};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::{Plugin, str_arg};
use crate::declare::ToolBuilder;
use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;
use crate::validation::ParameterRule;

const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
const BINARY_SNIFF_LEN: usize = 8192;

/// Directory listing, file reads and writes, and metadata lookups.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilesystemPlugin;

impl Plugin for FilesystemPlugin {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()> {
        ToolBuilder::new("list_dir")
            .description("List files and directories in a path, directories first.")
            .param(
                "path",
                ParameterRule::string()
                    .default(".")
                    .description("Directory to list (default: current directory)"),
            )
            .categories(["filesystem", "navigation"])
            .requires_filesystem()
            .example("list_dir(path=\"src\")")
            .register(registry, list_dir)?;

        ToolBuilder::new("read_file")
            .description("Read a text file. Binary files are reported by size instead.")
            .param(
                "filepath",
                ParameterRule::string().description("Path to the file"),
            )
            .param(
                "max_bytes",
                ParameterRule::integer()
                    .min(1)
                    .default(DEFAULT_MAX_BYTES)
                    .description("Maximum number of bytes returned"),
            )
            .categories(["filesystem", "io"])
            .requires_filesystem()
            .example("read_file(filepath=\"notes.txt\")")
            .register(registry, read_file)?;

        ToolBuilder::new("write_file")
            .description("Write text to a file, creating parent directories as needed.")
            .param("filepath", ParameterRule::string().description("Destination path"))
            .param("content", ParameterRule::string().description("Text to write"))
            .param(
                "append",
                ParameterRule::boolean()
                    .default(false)
                    .description("Append instead of overwriting"),
            )
            .categories(["filesystem", "io"])
            .requires_filesystem()
            .register(registry, write_file)?;

        ToolBuilder::new("get_file_metadata")
            .description("Get size, timestamps, permissions, and a coarse type for a path.")
            .param("filepath", ParameterRule::string().description("Path to inspect"))
            .categories(["filesystem", "metadata"])
            .requires_filesystem()
            .register(registry, get_file_metadata)
    }
}

async fn list_dir(args: Value) -> ToolResult<Value> {
    let path = str_arg(&args, "path")?;
    let mut reader = fs::read_dir(path)
        .await
        .map_err(|err| PluginError::execution(format!("cannot list `{path}`: {err}")))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|err| PluginError::execution(format!("cannot list `{path}`: {err}")))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let item = match entry.metadata().await {
            Ok(meta) => {
                let size = if meta.is_dir() {
                    "<DIR>".to_owned()
                } else {
                    human_size(meta.len())
                };
                json!({
                    "name": name,
                    "is_dir": meta.is_dir(),
                    "size": size,
                    "size_bytes": meta.len(),
                    "modified": meta.modified().ok().map(format_time),
                    "permissions": permissions(&meta),
                })
            }
            Err(err) => json!({ "name": name, "error": err.to_string() }),
        };
        entries.push(item);
    }

    entries.sort_by_key(|entry| {
        (
            !entry["is_dir"].as_bool().unwrap_or(false),
            entry["name"].as_str().unwrap_or_default().to_lowercase(),
        )
    });
    Ok(Value::Array(entries))
}

async fn read_file(args: Value) -> ToolResult<Value> {
    let filepath = str_arg(&args, "filepath")?;
    let max_bytes = args["max_bytes"].as_u64().unwrap_or(DEFAULT_MAX_BYTES);

    let meta = fs::metadata(filepath)
        .await
        .map_err(|err| PluginError::execution(format!("file not found: {filepath}: {err}")))?;
    if !meta.is_file() {
        return Err(PluginError::execution(format!(
            "not a regular file: {filepath}"
        )));
    }

    let file = fs::File::open(filepath)
        .await
        .map_err(|err| PluginError::execution(format!("error reading `{filepath}`: {err}")))?;
    let mut bytes = Vec::new();
    file.take(max_bytes)
        .read_to_end(&mut bytes)
        .await
        .map_err(|err| PluginError::execution(format!("error reading `{filepath}`: {err}")))?;

    let size = meta.len();
    let sniff = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    if sniff.contains(&0) {
        return Ok(json!({
            "path": filepath,
            "binary": true,
            "size_bytes": size,
            "content": format!("Binary file: {} ({size} bytes)", file_name(filepath)),
        }));
    }

    Ok(json!({
        "path": filepath,
        "binary": false,
        "size_bytes": size,
        "truncated": size > max_bytes,
        "content": String::from_utf8_lossy(&bytes),
    }))
}

async fn write_file(args: Value) -> ToolResult<Value> {
    let filepath = str_arg(&args, "filepath")?;
    let content = str_arg(&args, "content")?;
    let append = args["append"].as_bool().unwrap_or(false);
    let fail =
        |err: std::io::Error| PluginError::execution(format!("error writing `{filepath}`: {err}"));

    if let Some(parent) = Path::new(filepath).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(fail)?;
        }
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(filepath)
        .await
        .map_err(fail)?;
    file.write_all(content.as_bytes()).await.map_err(fail)?;
    file.flush().await.map_err(fail)?;

    Ok(json!({
        "path": filepath,
        "bytes_written": content.len(),
        "appended": append,
    }))
}

async fn get_file_metadata(args: Value) -> ToolResult<Value> {
    let filepath = str_arg(&args, "filepath")?;
    let meta = fs::metadata(filepath)
        .await
        .map_err(|err| PluginError::execution(format!("cannot stat `{filepath}`: {err}")))?;

    let absolute = fs::canonicalize(filepath)
        .await
        .map_or_else(|_| filepath.to_owned(), |p| p.display().to_string());

    let mut result = json!({
        "name": file_name(filepath),
        "path": absolute,
        "size_bytes": meta.len(),
        "is_directory": meta.is_dir(),
        "created": meta.created().ok().map(format_time),
        "modified": meta.modified().ok().map(format_time),
        "accessed": meta.accessed().ok().map(format_time),
        "permissions": permissions(&meta),
    });

    if !meta.is_dir() {
        let extension = Path::new(filepath)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        result["extension"] = json!(extension);
        result["type"] = json!(classify_extension(&extension));
    }

    Ok(result)
}

fn classify_extension(extension: &str) -> &'static str {
    match extension {
        "txt" | "md" | "rs" | "py" | "js" | "html" | "css" | "json" | "xml" | "toml" | "yaml"
        | "yml" | "csv" | "log" => "text",
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" => "image",
        "mp3" | "wav" | "ogg" | "flac" => "audio",
        "mp4" | "avi" | "mov" | "mkv" => "video",
        "pdf" | "docx" | "xlsx" | "pptx" => "document",
        _ => "unknown",
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_owned(), |name| name.to_string_lossy().into_owned())
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[allow(clippy::cast_precision_loss)]
fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let size = bytes as f64;
    if size < KB {
        format!("{bytes} B")
    } else if size < KB * KB {
        format!("{:.1} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.1} MB", size / (KB * KB))
    } else {
        format!("{:.1} GB", size / (KB * KB * KB))
    }
}

#[cfg(unix)]
fn permissions(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permissions(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "readonly".to_owned()
    } else {
        "readwrite".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        FilesystemPlugin.register(&mut registry).unwrap();
        registry
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/notes.txt");
        let path = path.to_str().unwrap();
        let registry = registry();

        registry
            .invoke("write_file", json!({ "filepath": path, "content": "hello" }))
            .await
            .unwrap();
        registry
            .invoke(
                "write_file",
                json!({ "filepath": path, "content": " world", "append": true }),
            )
            .await
            .unwrap();

        let read = registry
            .invoke("read_file", json!({ "filepath": path }))
            .await
            .unwrap();
        assert_eq!(read["content"], "hello world");
        assert_eq!(read["truncated"], false);

        let read = registry
            .invoke("read_file", json!({ "filepath": path, "max_bytes": 5 }))
            .await
            .unwrap();
        assert_eq!(read["content"], "hello");
        assert_eq!(read["truncated"], true);
    }

    #[tokio::test]
    async fn read_stops_at_the_byte_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        std::fs::write(&path, "a".repeat(100_000)).unwrap();

        let read = registry()
            .invoke(
                "read_file",
                json!({ "filepath": path.to_str().unwrap(), "max_bytes": 16 }),
            )
            .await
            .unwrap();
        assert_eq!(read["content"].as_str().unwrap().len(), 16);
        assert_eq!(read["size_bytes"], 100_000);
        assert_eq!(read["truncated"], true);
    }

    #[tokio::test]
    async fn binary_files_are_summarised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();

        let read = registry()
            .invoke("read_file", json!({ "filepath": path.to_str().unwrap() }))
            .await
            .unwrap();
        assert_eq!(read["binary"], true);
        assert!(read["content"].as_str().unwrap().contains("4 bytes"));
    }

    #[tokio::test]
    async fn list_dir_puts_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();

        let listing = registry()
            .invoke("list_dir", json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();
        let names: Vec<_> = listing
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["name"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["zeta", "a.txt"]);
        assert_eq!(listing[0]["size"], "<DIR>");
    }

    #[tokio::test]
    async fn metadata_classifies_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.PNG");
        std::fs::write(&path, "not really").unwrap();

        let meta = registry()
            .invoke(
                "get_file_metadata",
                json!({ "filepath": path.to_str().unwrap() }),
            )
            .await
            .unwrap();
        assert_eq!(meta["name"], "photo.PNG");
        assert_eq!(meta["type"], "image");
        assert_eq!(meta["size_bytes"], 10);
    }

    #[tokio::test]
    async fn missing_file_is_an_execution_error() {
        let err = registry()
            .invoke("read_file", json!({ "filepath": "/definitely/not/here" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        let err = registry()
            .invoke("read_file", json!({ "filepath": "x", "max_bytes": 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
