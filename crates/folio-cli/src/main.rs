// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folio — merge and rearrange pages of PDFs and images.
//
// Entry point. Initialises logging and configuration, then runs one pipeline
// session headlessly: load, extract, apply edits, export.

mod edits;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use folio_core::PipelineConfig;
use folio_core::error::Result;
use folio_core::human_errors::humanize_error;
use folio_core::types::UploadedFile;
use folio_document::render::oriented_preview;
use folio_pipeline::{DirectorySink, ExtractionSummary, PipelineSession, TracingObserver};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Merge, reorder, rotate and remove pages of PDFs and images", long_about = None)]
struct Cli {
    /// JSON settings file (defaults apply when absent)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine the pages of several files into one PDF
    Merge {
        /// PDFs and images, in upload order
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Output order as source:page pairs, 0-based (e.g. "1:0,0:0,0:2");
        /// pages not listed are left out
        #[arg(long, value_name = "SPEC")]
        order: Option<String>,

        /// Clockwise rotations as source:page=degrees (e.g. "0:1=90")
        #[arg(long, value_name = "SPEC")]
        rotate: Option<String>,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Extract pages and print what was found as JSON
    Inspect {
        /// PDFs and images, in upload order
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Also write every page preview as JPEG into this directory
        #[arg(long, value_name = "DIR")]
        thumbnails: Option<PathBuf>,

        /// Clockwise rotations applied to the previews (e.g. "0:1=90")
        #[arg(long, value_name = "SPEC")]
        rotate: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            debug!(error = %err, "run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let mut session = PipelineSession::new(config.clone(), Arc::new(TracingObserver));

    match cli.command {
        Commands::Merge {
            files,
            order,
            rotate,
            output,
        } => {
            let uploads = read_files(&files)?;
            session.load_files(&uploads)?;
            session.wait_for_extraction().await?;

            if let Some(spec) = order {
                edits::apply_order(session.model_mut(), &edits::parse_order(&spec)?)?;
            }
            if let Some(spec) = rotate {
                edits::apply_rotations(session.model_mut(), &edits::parse_rotations(&spec)?)?;
            }

            let path = session.export_to(&DirectorySink::new(output)).await?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Inspect {
            files,
            thumbnails,
            rotate,
        } => {
            let uploads = read_files(&files)?;
            let rejected = session.load_files(&uploads)?;
            let summary = session.wait_for_extraction().await?;
            if let Some(spec) = rotate {
                edits::apply_rotations(session.model_mut(), &edits::parse_rotations(&spec)?)?;
            }

            if let Some(dir) = thumbnails {
                write_previews(&session, &dir, config.thumbnail_jpeg_quality)?;
            }

            let report = InspectReport {
                summary,
                sources: session
                    .sources()
                    .map(|s| SourceReport {
                        index: s.source_index.0,
                        name: s.name.clone(),
                        kind: s.kind,
                        pages: s.page_count,
                        sha256: s.content_hash.clone(),
                    })
                    .collect(),
                rejected: rejected
                    .into_iter()
                    .map(|r| RejectedReport {
                        index: r.source_index.0,
                        name: r.name,
                        reason: r.reason,
                    })
                    .collect(),
                pages: session.model().descriptors().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct InspectReport {
    summary: ExtractionSummary,
    sources: Vec<SourceReport>,
    rejected: Vec<RejectedReport>,
    pages: Vec<folio_core::types::PageDescriptor>,
}

#[derive(Serialize)]
struct SourceReport {
    index: u32,
    name: String,
    kind: folio_core::types::SourceKind,
    pages: u32,
    sha256: String,
}

#[derive(Serialize)]
struct RejectedReport {
    index: u32,
    name: String,
    reason: String,
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)?;
            info!(path = %path.display(), "settings loaded");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Read files from disk as uploads; the MIME type comes from the extension.
fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    paths
        .iter()
        .map(|path| -> Result<UploadedFile> {
            let bytes = std::fs::read(path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mime = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(UploadedFile::mime_from_extension)
                .unwrap_or_else(|| {
                    warn!(file = %path.display(), "unknown file type");
                    "application/octet-stream"
                });
            Ok(UploadedFile::new(name, mime, bytes))
        })
        .collect()
}

fn write_previews(session: &PipelineSession, dir: &Path, quality: u8) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for page in session.model().descriptors() {
        let Some(thumbnail) = &page.thumbnail else {
            continue;
        };
        let bytes = oriented_preview(thumbnail, page.rotation, quality)?;
        let name = format!("{}_{}.jpg", page.source_index, page.original_page_index);
        std::fs::write(dir.join(name), bytes)?;
    }
    Ok(())
}
