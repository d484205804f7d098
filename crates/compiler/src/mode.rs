//! Where compile jobs are executed.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// In-process stand-in that writes a placeholder PDF.
    Simulate,
    /// In-process run of the real LaTeX engine.
    Local,
    /// Jobs are only queued; a separate worker process runs them.
    #[default]
    External,
}

impl ExecutionMode {
    /// Resolve the mode from `COMPILE_MODE` and the legacy
    /// `SIMULATE_COMPILER` switch. A truthy switch forces [`Simulate`].
    ///
    /// [`Simulate`]: ExecutionMode::Simulate
    pub fn resolve(mode: Option<&str>, simulate_switch: Option<&str>) -> Result<Self, String> {
        if simulate_switch.is_some_and(is_truthy) {
            return Ok(ExecutionMode::Simulate);
        }
        match mode.map(str::trim).filter(|m| !m.is_empty()) {
            Some(mode) => mode.parse(),
            None => Ok(ExecutionMode::default()),
        }
    }

    /// Whether the API process runs jobs itself.
    pub fn runs_in_process(self) -> bool {
        !matches!(self, ExecutionMode::External)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Simulate => "simulate",
            ExecutionMode::Local => "local",
            ExecutionMode::External => "external",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulate" | "simulated" => Ok(ExecutionMode::Simulate),
            "local" => Ok(ExecutionMode::Local),
            "external" => Ok(ExecutionMode::External),
            other => Err(format!("unknown compile mode '{other}'")),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
