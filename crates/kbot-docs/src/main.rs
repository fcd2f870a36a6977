//! Consolidate a documentation tree into `ape_docs.txt` and `vyper_docs.txt`.
//!
//! Usage: `kbot-docs [BASE_DIR] [OUT_DIR]` (defaults: `knowledge-base`, `.`).

use std::path::PathBuf;

use kbot_core::knowledge::consolidate::consolidate_docs;

fn main() -> Result<(), kbot_core::Error> {
    kbot_core::logging::init("kbot-docs")?;

    let mut args = std::env::args().skip(1);
    let base_dir = PathBuf::from(args.next().unwrap_or_else(|| "knowledge-base".to_string()));
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    match consolidate_docs(&base_dir, &out_dir) {
        Ok(report) => {
            if !report.skipped.is_empty() {
                tracing::warn!(count = report.skipped.len(), "some files were skipped");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("error consolidating documentation: {e}");
            Err(e)
        }
    }
}
