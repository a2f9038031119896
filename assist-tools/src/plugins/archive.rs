//! Zip archive creation and extraction.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{Plugin, str_arg};
use crate::declare::ToolBuilder;
use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;
use crate::validation::ParameterRule;

/// Zip tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchivePlugin;

impl Plugin for ArchivePlugin {
    fn name(&self) -> &str {
        "archive"
    }

    fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()> {
        ToolBuilder::new("zip_archive_files")
            .description("Create a zip archive from files. Missing files are skipped.")
            .param(
                "file_name",
                ParameterRule::string().description("Archive path; `.zip` is appended if absent"),
            )
            .param(
                "files",
                ParameterRule::array().description("Paths of the files to include"),
            )
            .categories(["archive", "filesystem"])
            .requires_filesystem()
            .example("zip_archive_files(file_name=\"logs\", files=[\"a.log\", \"b.log\"])")
            .register(registry, zip_archive_files)?;

        ToolBuilder::new("zip_extract_files")
            .description("Extract a zip archive. Entries escaping the target directory are skipped.")
            .param("zip_file", ParameterRule::string().description("Path to the archive"))
            .param(
                "extract_path",
                ParameterRule::string()
                    .optional()
                    .description("Destination directory (default: the archive's directory)"),
            )
            .categories(["archive", "filesystem"])
            .requires_filesystem()
            .register(registry, zip_extract_files)
    }
}

async fn zip_archive_files(args: Value) -> ToolResult<Value> {
    let mut archive = PathBuf::from(str_arg(&args, "file_name")?);
    if archive.extension().is_none_or(|ext| ext != "zip") {
        archive.as_mut_os_string().push(".zip");
    }
    let files: Vec<PathBuf> = args["files"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default();

    tokio::task::spawn_blocking(move || write_archive(&archive, &files))
        .await
        .map_err(|err| PluginError::execution(format!("archive task failed: {err}")))?
}

fn write_archive(archive: &Path, files: &[PathBuf]) -> ToolResult<Value> {
    let fail = |err: &dyn std::fmt::Display| {
        PluginError::execution(format!("cannot write `{}`: {err}", archive.display()))
    };
    if let Some(parent) = archive.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| fail(&err))?;
    }

    let mut writer = ZipWriter::new(File::create(archive).map_err(|err| fail(&err))?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut added = Vec::new();
    let mut skipped = Vec::new();

    for path in files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let source = match (name, File::open(path)) {
            (Some(name), Ok(file)) if path.is_file() => (name, file),
            _ => {
                skipped.push(path.display().to_string());
                continue;
            }
        };
        let (name, mut file) = source;
        writer
            .start_file(name.clone(), options.clone())
            .map_err(|err| fail(&err))?;
        io::copy(&mut file, &mut writer).map_err(|err| fail(&err))?;
        added.push(name);
    }
    writer.finish().map_err(|err| fail(&err))?;

    let size = std::fs::metadata(archive).map_or(0, |meta| meta.len());
    Ok(json!({
        "success": true,
        "archive_name": archive.display().to_string(),
        "archive_size": size,
        "file_count": added.len(),
        "files": added,
        "skipped": skipped,
    }))
}

async fn zip_extract_files(args: Value) -> ToolResult<Value> {
    let zip_file = PathBuf::from(str_arg(&args, "zip_file")?);
    let target = match args.get("extract_path").and_then(Value::as_str) {
        Some(path) => PathBuf::from(path),
        None => zip_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
    };

    tokio::task::spawn_blocking(move || extract_archive(&zip_file, &target))
        .await
        .map_err(|err| PluginError::execution(format!("extract task failed: {err}")))?
}

fn extract_archive(zip_file: &Path, target: &Path) -> ToolResult<Value> {
    let fail = |err: &dyn std::fmt::Display| {
        PluginError::execution(format!("cannot extract `{}`: {err}", zip_file.display()))
    };
    if !zip_file.is_file() {
        return Err(PluginError::execution(format!(
            "zip file not found: {}",
            zip_file.display()
        )));
    }

    let mut archive = ZipArchive::new(File::open(zip_file).map_err(|err| fail(&err))?)
        .map_err(|err| fail(&err))?;
    std::fs::create_dir_all(target).map_err(|err| fail(&err))?;

    let mut extracted = Vec::new();
    let mut skipped = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| fail(&err))?;
        let Some(relative) = entry.enclosed_name() else {
            skipped.push(entry.name().to_owned());
            continue;
        };
        let out = target.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(|err| fail(&err))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|err| fail(&err))?;
        }
        let mut file = File::create(&out).map_err(|err| fail(&err))?;
        io::copy(&mut entry, &mut file).map_err(|err| fail(&err))?;
        extracted.push(out.display().to_string());
    }

    Ok(json!({
        "success": true,
        "extract_path": target.display().to_string(),
        "file_count": extracted.len(),
        "files": extracted,
        "skipped": skipped,
    }))
}
