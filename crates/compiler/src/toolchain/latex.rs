use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use texsync_core::job::{DEFAULT_ENGINE_OPTIONS, SUPPORTED_ENGINES};
use texsync_core::paths::{normalize_relative, safe_join};
use texsync_store::layout::OUTPUT_PDF;
use tokio::process::Command;

use super::{CompileInput, Toolchain};
use crate::error::CompileError;
use crate::subprocess::run_command;

/// Runs a real TeX engine in the project directory:
/// `<engine> <options> -output-directory=. <entry>`.
#[derive(Debug, Clone)]
pub struct LatexToolchain {
    timeout: Duration,
}

impl LatexToolchain {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Toolchain for LatexToolchain {
    fn name(&self) -> &'static str {
        "latex"
    }

    async fn compile(&self, input: CompileInput<'_>) -> Result<(), CompileError> {
        let job = input.job;
        let log = input.log;
        if !SUPPORTED_ENGINES.contains(&job.engine.as_str()) {
            return Err(CompileError::UnsupportedEngine(job.engine.clone()));
        }
        let entry = normalize_relative(&job.entry_file)
            .map_err(|e| CompileError::InvalidEntry(e.to_string()))?;
        let entry_path = safe_join(input.project_dir, &entry)
            .map_err(|e| CompileError::InvalidEntry(e.to_string()))?;

        if let Some(content) = input.buffer {
            if let Some(parent) = entry_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&entry_path, content).await?;
            log.append(&format!(
                "Flushed in-memory buffer for {entry} ({} bytes)\n",
                content.len()
            ))
            .await?;
        }
        if !tokio::fs::try_exists(&entry_path).await? {
            return Err(CompileError::MissingEntry(entry));
        }

        let options: Vec<String> = if job.options.is_empty() {
            DEFAULT_ENGINE_OPTIONS.iter().map(|o| o.to_string()).collect()
        } else {
            job.options
                .iter()
                .filter(|o| !o.starts_with("-output-directory"))
                .cloned()
                .collect()
        };

        let mut cmd = Command::new(&job.engine);
        cmd.args(&options)
            .arg("-output-directory=.")
            .arg(&entry)
            .current_dir(input.project_dir);
        log.append(&format!(
            "Running: {} {} -output-directory=. {entry}\n\n",
            job.engine,
            options.join(" ")
        ))
        .await?;

        let output = run_command(&mut cmd, self.timeout).await?;
        log.append(&output.stdout).await?;
        if !output.stderr.is_empty() {
            log.append(&output.stderr).await?;
        }
        log.append(&format!(
            "\nCompilation finished with return code: {}\n",
            output.exit_code
        ))
        .await?;

        if !output.success() {
            return Err(CompileError::EngineFailed(output.exit_code));
        }

        let stem = Path::new(&entry)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let generated = input.project_dir.join(format!("{stem}.pdf"));
        if !tokio::fs::try_exists(&generated).await? {
            return Err(CompileError::NoOutput);
        }
        let output_pdf = input.project_dir.join(OUTPUT_PDF);
        if generated != output_pdf {
            tokio::fs::copy(&generated, &output_pdf).await?;
        }
        let size = tokio::fs::metadata(&output_pdf).await?.len();
        log.append(&format!("PDF generated: {OUTPUT_PDF} ({size} bytes)\n"))
            .await?;
        Ok(())
    }
}
