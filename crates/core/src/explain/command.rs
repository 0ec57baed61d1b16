use super::template::build_prompt;
use super::{ExplainError, ExplainResult, ExplanationGenerator};
use crate::constants::{DEFAULT_EXPLAINER_MODEL, DEFAULT_EXPLAINER_PROGRAM, DEFAULT_EXPLAINER_TIMEOUT};
use crate::label::DiseaseLabel;
use async_trait::async_trait;
use leafdoc_types::Confidence;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Settings for the local model runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainerConfig {
    pub program: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_EXPLAINER_PROGRAM.into(),
            model: DEFAULT_EXPLAINER_MODEL.into(),
            timeout: DEFAULT_EXPLAINER_TIMEOUT,
        }
    }
}

/// Runs an external program that reads a prompt on stdin and writes the answer to stdout.
///
/// The child is killed if the timeout expires before it exits.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `<program> run <model>`, the ollama calling convention.
    pub fn from_config(config: &ExplainerConfig) -> Self {
        Self::new(
            config.program.clone(),
            vec!["run".into(), config.model.clone()],
            config.timeout,
        )
    }

    async fn run(&self, prompt: &str) -> ExplainResult<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExplainError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A runner may answer without reading its input; exit status and stdout decide.
            match stdin.write_all(prompt.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("explainer {} closed stdin early", self.program);
                }
                Err(e) => return Err(e.into()),
            }
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ExplainError::NonZeroExit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ExplanationGenerator for CommandGenerator {
    async fn generate(
        &self,
        label: DiseaseLabel,
        confidence: Option<Confidence>,
    ) -> ExplainResult<String> {
        let prompt = build_prompt(label, confidence);
        tracing::debug!("running explainer {} for {label}", self.program);

        match tokio::time::timeout(self.timeout, self.run(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ExplainError::Timeout(self.timeout)),
        }
    }
}
