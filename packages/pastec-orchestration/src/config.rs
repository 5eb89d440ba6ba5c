//! Run configuration (YAML)
//!
//! One immutable `Config` is loaded and validated before any phase runs and is then
//! passed by reference to every component that needs it.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default lower bound on sequences per batch
pub const DEFAULT_MIN_BATCH_SIZE: usize = 100;

const MAX_PROJECT_NAME_LEN: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub project: ProjectSection,

    pub classif_consensus: ClassifConsensusSection,

    #[serde(default)]
    pub execution: ExecutionSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub tools: ToolsSection,

    /// File the configuration was loaded from (staged into every dispatched job)
    #[serde(skip)]
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub project_name: String,
}

/// Post-processing toggles and parallel classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifConsensusSection {
    pub clean: bool,
    pub remove_redundancy: bool,
    pub rev_complement: bool,
    pub add_wicker_code: bool,
    #[serde(rename = "add_noCat_bestHitClassif")]
    pub add_nocat_best_hit_classif: bool,

    // Required only when classifying in parallel
    #[serde(default)]
    pub limit_job_nb: Option<usize>,
    #[serde(default)]
    pub resources: Option<String>,
    #[serde(default, rename = "tmpDir")]
    pub tmp_dir: Option<String>,

    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,

    /// Verify sequence/record consistency after every post-processing stage
    #[serde(default = "default_true")]
    pub check_consistency: bool,
}

fn default_min_batch_size() -> usize {
    DEFAULT_MIN_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Jobs run at once by the local backend (defaults to the CPU count)
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,
}

fn default_backend() -> String {
    "local".to_string()
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_concurrent_jobs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pastec.db")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Argv template for an external tool
///
/// Every `{name}` placeholder is substituted from the variables passed to
/// [`ToolTemplate::render`]. An argument that consists of exactly one placeholder
/// expands to all of that variable's values, so an empty variable drops the
/// argument entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolTemplate(pub Vec<String>);

/// Variables available to a [`ToolTemplate`]
pub type ToolVars = BTreeMap<&'static str, Vec<String>>;

impl ToolTemplate {
    pub fn new<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Self(args.into_iter().map(Into::into).collect())
    }

    pub fn render(&self, vars: &ToolVars) -> Result<Vec<String>> {
        let mut argv = Vec::with_capacity(self.0.len());

        for arg in &self.0 {
            if let Some(name) = whole_placeholder(arg) {
                let values = vars.get(name).ok_or_else(|| unknown_placeholder(name, arg))?;
                argv.extend(values.iter().cloned());
                continue;
            }

            let mut rendered = String::with_capacity(arg.len());
            let mut rest = arg.as_str();
            while let Some(open) = rest.find('{') {
                let close = rest[open..].find('}').map(|c| open + c).ok_or_else(|| {
                    PipelineError::Config(format!("Unclosed placeholder in tool argument '{}'", arg))
                })?;
                let name = &rest[open + 1..close];
                let values = vars.get(name).ok_or_else(|| unknown_placeholder(name, arg))?;
                rendered.push_str(&rest[..open]);
                rendered.push_str(&values.join(" "));
                rest = &rest[close + 1..];
            }
            rendered.push_str(rest);
            argv.push(rendered);
        }

        if argv.is_empty() {
            return Err(PipelineError::Config(
                "Tool template renders to an empty command".to_string(),
            ));
        }
        Ok(argv)
    }
}

fn whole_placeholder(arg: &str) -> Option<&str> {
    let inner = arg.strip_prefix('{')?.strip_suffix('}')?;
    (!inner.contains(['{', '}'])).then_some(inner)
}

fn unknown_placeholder(name: &str, arg: &str) -> PipelineError {
    PipelineError::Config(format!(
        "Unknown placeholder '{{{}}}' in tool argument '{}'",
        name, arg
    ))
}

/// Command templates for the external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ToolsSection {
    pub detect_features: ToolTemplate,
    pub detect_features_parallel: ToolTemplate,
    pub classify: ToolTemplate,
    pub remove_redundancy: ToolTemplate,
    pub rename_headers: ToolTemplate,
    pub nocat_best_hit: ToolTemplate,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            detect_features: ToolTemplate::new([
                "DetectTEFeatures.py",
                "-f",
                "{input}",
                "-P",
                "{project}",
                "-C",
                "{config}",
                "{clean}",
                "-v",
                "{verbosity}",
            ]),
            detect_features_parallel: ToolTemplate::new([
                "DetectTEFeatures_parallelized.py",
                "-f",
                "{input}",
                "-P",
                "{project}",
                "-C",
                "{config}",
                "{clean}",
                "-v",
                "{verbosity}",
            ]),
            classify: ToolTemplate::new([
                "LaunchPASTEC.py",
                "-C",
                "{config}",
                "{decision_rules}",
                "-P",
                "{project}",
                "{step}",
                "-i",
                "{input}",
                "-v",
                "{verbosity}",
            ]),
            remove_redundancy: ToolTemplate::new([
                "RemoveRedundancyBasedOnCI.py",
                "-i",
                "{input}",
                "-c",
                "{classif}",
                "-C",
                "{config}",
                "-o",
                "{out_fasta}",
                "{clean}",
                "-v",
                "{verbosity}",
            ]),
            rename_headers: ToolTemplate::new([
                "RenameHeaderClassif.py",
                "-c",
                "{classif}",
                "-f",
                "{input}",
                "-p",
                "{project}",
                "-s",
                "-r",
                "-o",
                "{out_fasta}",
                "-v",
                "{verbosity}",
            ]),
            nocat_best_hit: ToolTemplate::new([
                "NoCatBestHitClassifier.py",
                "-f",
                "{input}",
                "-c",
                "{classif}",
                "-o",
                "{out_fasta}",
                "-v",
                "{verbosity}",
            ]),
        }
    }
}

impl Config {
    /// Load and validate a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_yaml_str(&content)?;
        config.source_path = path.to_path_buf();
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PipelineError::serialization)
    }

    pub fn project_name(&self) -> &str {
        &self.project.project_name
    }

    pub fn validate(&self) -> Result<()> {
        validate_project_name(&self.project.project_name)?;

        if self.classif_consensus.min_batch_size == 0 {
            return Err(PipelineError::Config(
                "classif_consensus.min_batch_size must be at least 1".to_string(),
            ));
        }
        if self.execution.max_concurrent_jobs == Some(0) {
            return Err(PipelineError::Config(
                "execution.max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings that only the parallel path needs
    pub fn validate_parallel(&self) -> Result<()> {
        let section = &self.classif_consensus;
        let mut missing = Vec::new();
        if section.limit_job_nb.is_none() {
            missing.push("limit_job_nb");
        }
        if section.resources.is_none() {
            missing.push("resources");
        }
        if section.tmp_dir.is_none() {
            missing.push("tmpDir");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Config(format!(
                "Parallel mode requires classif_consensus.{}",
                missing.join(", classif_consensus.")
            )))
        }
    }
}

/// Project names feed table and file names. The whole name is alphanumeric or
/// underscore; at most 15 characters, not counting a trailing `_sim…` / `_struct…` part.
pub fn validate_project_name(name: &str) -> Result<()> {
    let base = name.split("_sim").next().unwrap_or_default();
    let base = base.split("_struct").next().unwrap_or_default();

    if base.is_empty() {
        return Err(PipelineError::Config(
            "project.project_name must not be empty".to_string(),
        ));
    }
    if base.chars().count() > MAX_PROJECT_NAME_LEN {
        return Err(PipelineError::Config(format!(
            "project name '{}' is too long. It must have {} characters max",
            name, MAX_PROJECT_NAME_LEN
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PipelineError::Config(format!(
            "project name '{}' must contain only alphanumeric or underscore characters",
            name
        )));
    }
    Ok(())
}
