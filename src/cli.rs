//! Command-line front end
//!
//! `serve` runs the HTTP ingress; `bundle` flattens local files without a
//! server and writes the result to disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use log::info;

use crate::config::InlinerConfig;
use crate::embedder::ImageMime;
use crate::pipeline::process_upload;
use crate::preprocess::PhpPreprocessor;
use crate::server;
use crate::workdir::UploadedFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Serve {
        port: Option<u16>,
        upload_dir: Option<PathBuf>,
        public_dir: Option<PathBuf>,
    },
    Bundle {
        inputs: Vec<PathBuf>,
        output: Option<PathBuf>,
        image_mime: Option<ImageMime>,
    },
}

pub fn help_text() -> String {
    [
        "site-inliner: flatten a web-site bundle into one self-contained HTML file",
        "",
        "Usage:",
        "  site-inliner serve [--port N] [--upload-dir DIR] [--public-dir DIR]",
        "  site-inliner bundle <FILE|DIR>... [-o OUT] [--image-mime fixed|sniff]",
    ]
    .join("\n")
}

pub async fn run_from_env() -> Result<()> {
    run_from_args(env::args().skip(1).collect()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<()> {
    let command = parse_command(args)?;
    let base = InlinerConfig::from_env().context("invalid environment configuration")?;
    match command {
        CliCommand::Serve {
            port,
            upload_dir,
            public_dir,
        } => {
            let mut builder = InlinerConfig::builder()
                .upload_dir(upload_dir.unwrap_or_else(|| base.upload_dir().clone()));
            builder = builder
                .public_dir(public_dir.unwrap_or_else(|| base.public_dir().to_path_buf()))
                .bind_addr(base.bind_addr())
                .port(port.unwrap_or(base.port()))
                .php_binary(base.php_binary())
                .preprocess_timeout_secs(base.preprocess_timeout().as_secs())
                .image_mime(base.image_mime())
                .max_upload_bytes(base.max_upload_bytes())
                .entry_names(base.entry_names().iter().cloned());
            server::serve(builder.build()?).await
        }
        CliCommand::Bundle {
            inputs,
            output,
            image_mime,
        } => {
            tokio::task::spawn_blocking(move || {
                run_bundle(&base, &inputs, output, image_mime.unwrap_or(base.image_mime()))
            })
            .await
            .context("bundle worker failed")??;
            Ok(())
        }
    }
}

pub fn parse_command(args: Vec<String>) -> Result<CliCommand> {
    let Some(cmd) = args.first() else {
        bail!(help_text());
    };
    match cmd.as_str() {
        "serve" => parse_serve(&args[1..]),
        "bundle" => parse_bundle(&args[1..]),
        "help" | "--help" | "-h" => bail!(help_text()),
        other => bail!("unknown command: {other}\n\n{}", help_text()),
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a String> {
    args.get(i)
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn parse_serve(args: &[String]) -> Result<CliCommand> {
    let mut port = None;
    let mut upload_dir = None;
    let mut public_dir = None;

    let mut i = 0usize;
    while i < args.len() {
        let token = args[i].as_str();
        match token {
            "--port" => {
                i += 1;
                let value = flag_value(args, i, token)?;
                port = Some(
                    value
                        .parse::<u16>()
                        .map_err(|_| anyhow!("invalid port: {value}"))?,
                );
            }
            "--upload-dir" => {
                i += 1;
                upload_dir = Some(PathBuf::from(flag_value(args, i, token)?));
            }
            "--public-dir" => {
                i += 1;
                public_dir = Some(PathBuf::from(flag_value(args, i, token)?));
            }
            x => bail!("unknown argument for serve: {x}"),
        }
        i += 1;
    }

    Ok(CliCommand::Serve {
        port,
        upload_dir,
        public_dir,
    })
}

fn parse_bundle(args: &[String]) -> Result<CliCommand> {
    let mut inputs = Vec::new();
    let mut output = None;
    let mut image_mime = None;

    let mut i = 0usize;
    while i < args.len() {
        let token = args[i].as_str();
        match token {
            "-o" | "--output" => {
                i += 1;
                output = Some(PathBuf::from(flag_value(args, i, token)?));
            }
            "--image-mime" => {
                i += 1;
                let value = flag_value(args, i, token)?;
                image_mime = Some(value.parse::<ImageMime>().map_err(|e| anyhow!(e))?);
            }
            x if x.starts_with('-') => bail!("unknown flag: {x}"),
            _ => inputs.push(PathBuf::from(token)),
        }
        i += 1;
    }

    if inputs.is_empty() {
        bail!("bundle needs at least one input file or directory");
    }
    Ok(CliCommand::Bundle {
        inputs,
        output,
        image_mime,
    })
}

/// Flatten local files into `output` (default `./<entry>`)
///
/// Inputs are copied into a scratch upload area first, so the originals are
/// never moved or deleted.
pub fn run_bundle(
    base: &InlinerConfig,
    inputs: &[PathBuf],
    output: Option<PathBuf>,
    image_mime: ImageMime,
) -> Result<PathBuf> {
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    let staging = scratch.path().join("staging");
    fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;

    let mut files = Vec::new();
    for input in inputs {
        collect_files(input, &mut files)?;
    }

    let mut uploads = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let temp_path = staging.join(i.to_string());
        fs::copy(file, &temp_path)
            .with_context(|| format!("failed to copy {}", file.display()))?;
        uploads.push(UploadedFile::new(file.to_string_lossy(), temp_path));
    }

    let config = InlinerConfig::builder()
        .upload_dir(scratch.path().join("work"))
        .php_binary(base.php_binary())
        .preprocess_timeout_secs(base.preprocess_timeout().as_secs())
        .image_mime(image_mime)
        .entry_names(base.entry_names().iter().cloned())
        .build()?;
    let preprocessor = PhpPreprocessor::new(config.php_binary(), config.preprocess_timeout());

    let site = process_upload(&config, &uploads, &preprocessor)?;
    let output = output.unwrap_or_else(|| PathBuf::from(&site.file_name));
    fs::write(&output, &site.html)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        target: "site_inliner::cli",
        "Wrote {} ({} bytes, {} unresolved references)",
        output.display(),
        site.html.len(),
        site.rewrite.unresolved.len()
    );
    for unresolved in &site.rewrite.unresolved {
        info!(target: "site_inliner::cli", "  left as-is: {} {}", unresolved.kind, unresolved.reference);
    }
    Ok(output)
}

/// Files under `path` in name order; a plain file is returned as-is
fn collect_files(path: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let meta = fs::metadata(path).with_context(|| format!("cannot read {}", path.display()))?;
    if meta.is_file() {
        out.push(path.to_path_buf());
        return Ok(());
    }
    let mut entries = fs::read_dir(path)
        .with_context(|| format!("cannot list {}", path.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("cannot list {}", path.display()))?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        collect_files(&entry.path(), out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_serve_flags() {
        let cmd = parse_command(args(&["serve", "--port", "8080", "--upload-dir", "/tmp/u"])).unwrap();
        assert_eq!(
            cmd,
            CliCommand::Serve {
                port: Some(8080),
                upload_dir: Some(PathBuf::from("/tmp/u")),
                public_dir: None,
            }
        );
    }

    #[test]
    fn parses_bundle_inputs_and_output() {
        let cmd = parse_command(args(&["bundle", "site/", "extra.css", "-o", "out.html", "--image-mime", "sniff"]))
            .unwrap();
        assert_eq!(
            cmd,
            CliCommand::Bundle {
                inputs: vec![PathBuf::from("site/"), PathBuf::from("extra.css")],
                output: Some(PathBuf::from("out.html")),
                image_mime: Some(ImageMime::Sniff),
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command(args(&[])).is_err());
        assert!(parse_command(args(&["bundle"])).is_err());
        assert!(parse_command(args(&["serve", "--port", "x"])).is_err());
        assert!(parse_command(args(&["serve", "--port"])).is_err());
        assert!(parse_command(args(&["frobnicate"])).is_err());
    }
}
