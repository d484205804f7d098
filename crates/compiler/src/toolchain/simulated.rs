use std::time::Duration;

use async_trait::async_trait;
use texsync_core::paths::safe_join;
use texsync_store::layout::OUTPUT_PDF;

use super::{CompileInput, Toolchain};
use crate::error::CompileError;

/// Minimal single-page PDF so previews render without a TeX installation.
pub const PLACEHOLDER_PDF: &str = "%PDF-1.4\n\
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Count 1/Kids[3 0 R]>>endobj\n\
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]/Contents 4 0 R/Resources<</Font<</F1 5 0 R>>>>>>endobj\n\
4 0 obj<</Length 112>>stream\n\
BT /F1 20 Tf 72 720 Td (Placeholder PDF) Tj ET\n\
BT /F1 12 Tf 72 700 Td (Waiting for real LaTeX output...) Tj ET\n\
endstream endobj\n\
5 0 obj<</Type/Font/Subtype/Type1/BaseFont/Helvetica>>endobj\n\
xref\n0 6\n\
0000000000 65535 f \n\
0000000010 00000 n \n\
0000000065 00000 n \n\
0000000122 00000 n \n\
0000000339 00000 n \n\
0000000557 00000 n \n\
trailer<</Size 6/Root 1 0 R>>\nstartxref\n647\n%%EOF\n";

/// Stand-in compiler: reads the entry, waits a moment, writes a placeholder
/// PDF unless a real one is already there.
#[derive(Debug, Clone)]
pub struct SimulatedToolchain {
    delay: Duration,
}

impl SimulatedToolchain {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(400);

    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedToolchain {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl Toolchain for SimulatedToolchain {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn compile(&self, input: CompileInput<'_>) -> Result<(), CompileError> {
        let log = input.log;
        let entry = &input.job.entry_file;
        log.append("Simulated compiler starting...\n").await?;

        match input.buffer {
            Some(content) => {
                log.append(&format!(
                    "Using in-memory buffer for {entry} ({} bytes)\n",
                    content.len()
                ))
                .await?
            }
            None => match safe_join(input.project_dir, entry) {
                Ok(path) => match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        log.append(&format!("Read {entry} ({} bytes)\n", bytes.len()))
                            .await?
                    }
                    Err(_) => {
                        log.append("Entry file missing, continuing with placeholder PDF...\n")
                            .await?
                    }
                },
                Err(_) => log.append("Invalid entry file path\n").await?,
            },
        }

        tokio::time::sleep(self.delay).await;

        let output = input.project_dir.join(OUTPUT_PDF);
        if tokio::fs::try_exists(&output).await? {
            log.append("Detected existing output.pdf; preserving real output.\n")
                .await?;
        } else {
            tokio::fs::write(&output, PLACEHOLDER_PDF).await?;
            log.append("Wrote placeholder PDF output.pdf\n").await?;
        }
        Ok(())
    }
}
