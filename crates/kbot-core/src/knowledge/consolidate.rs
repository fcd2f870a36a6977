//! Merge a documentation tree into two flat text blobs.
//!
//! Layout expected under `base_dir`:
//! - `apeworx/*.txt` plus `apeworx/{commands,methoddocs,userguides}/**/*.txt`
//! - `vyper/**/*.txt`
//!
//! Output: `ape_docs.txt` and `vyper_docs.txt` in `out_dir`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

pub const APE_DIR: &str = "apeworx";
pub const VYPER_DIR: &str = "vyper";
pub const APE_SUBDIRS: [&str; 3] = ["commands", "methoddocs", "userguides"];
pub const APE_OUTPUT: &str = "ape_docs.txt";
pub const VYPER_OUTPUT: &str = "vyper_docs.txt";

#[derive(Clone, Debug, Default)]
pub struct ConsolidationReport {
    pub ape_docs: PathBuf,
    pub ape_files: usize,
    pub vyper_docs: PathBuf,
    pub vyper_files: usize,
    /// Files that could not be read (logged, left out of the blobs).
    pub skipped: Vec<PathBuf>,
}

#[derive(Default)]
struct Blob {
    parts: Vec<String>,
    files: usize,
    skipped: Vec<PathBuf>,
}

impl Blob {
    fn push_file(&mut self, path: &Path) {
        match fs::read_to_string(path) {
            Ok(content) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.parts.push(format!("### {name}\n{content}\n"));
                self.files += 1;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), "error reading doc file: {e}");
                self.skipped.push(path.to_path_buf());
            }
        }
    }

    fn render(&self) -> String {
        self.parts.join("\n")
    }
}

pub fn consolidate_docs(base_dir: &Path, out_dir: &Path) -> Result<ConsolidationReport> {
    fs::create_dir_all(out_dir)?;

    let ape = collect_ape(&base_dir.join(APE_DIR))?;
    let ape_docs = out_dir.join(APE_OUTPUT);
    fs::write(&ape_docs, ape.render())?;
    tracing::info!(files = ape.files, path = %ape_docs.display(), "ApeWorX documentation consolidated");

    let vyper = collect_vyper(&base_dir.join(VYPER_DIR))?;
    let vyper_docs = out_dir.join(VYPER_OUTPUT);
    fs::write(&vyper_docs, vyper.render())?;
    tracing::info!(files = vyper.files, path = %vyper_docs.display(), "Vyper documentation consolidated");

    let mut skipped = ape.skipped;
    skipped.extend(vyper.skipped);

    Ok(ConsolidationReport {
        ape_docs,
        ape_files: ape.files,
        vyper_docs,
        vyper_files: vyper.files,
        skipped,
    })
}

fn collect_ape(ape_base: &Path) -> Result<Blob> {
    let mut blob = Blob::default();

    if ape_base.is_dir() {
        for file in txt_files(ape_base, false)? {
            blob.push_file(&file);
        }
    }

    for sub in APE_SUBDIRS {
        let dir = ape_base.join(sub);
        if !dir.is_dir() {
            continue;
        }
        blob.parts.push(format!("\n## {}\n", sub.to_uppercase()));
        for file in txt_files(&dir, true)? {
            blob.push_file(&file);
        }
    }

    Ok(blob)
}

fn collect_vyper(vyper_base: &Path) -> Result<Blob> {
    let mut blob = Blob::default();
    if vyper_base.is_dir() {
        for file in txt_files(vyper_base, true)? {
            blob.push_file(&file);
        }
    }
    Ok(blob)
}

/// `*.txt` files under `dir`, sorted by path.
fn txt_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let rd = fs::read_dir(&current)
            .map_err(|e| Error::Knowledge(format!("cannot list {}: {e}", current.display())))?;
        for ent in rd.flatten() {
            let path = ent.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "txt") {
                out.push(path);
            }
        }
    }

    out.sort();
    Ok(out)
}
