use super::{
    BestHitAnnotator, Classifier, ClassifierStep, FeatureDetector, HeaderAnnotator,
    RedundancyRemover,
};
use crate::artifact::{self, ArtifactPair};
use crate::config::{ToolTemplate, ToolVars};
use crate::error::{PipelineError, Result};
use crate::pipeline::StageContext;
use crate::process::run_command;
use crate::seqio::SequenceCollection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A configured command line, run in the working directory
#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: String,
    template: ToolTemplate,
}

impl ExternalTool {
    pub fn new(template: ToolTemplate) -> Self {
        let name = template.0.first().cloned().unwrap_or_default();
        Self { name, template }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn invoke(&self, vars: &ToolVars, cwd: &Path) -> Result<String> {
        let argv = self.template.render(vars)?;
        info!("Running {}", self.name);
        let stdout = run_command(&argv, cwd).await?;
        if !stdout.is_empty() {
            debug!("{} output:\n{}", self.name, stdout.trim_end());
        }
        Ok(stdout)
    }
}

/// Variables shared by every tool invocation; per-call inputs start empty
pub fn base_vars(ctx: &StageContext) -> ToolVars {
    let mut vars = ToolVars::new();
    vars.insert("project", vec![ctx.project.clone()]);
    vars.insert("config", vec![path_arg(&ctx.config_path)]);
    vars.insert("verbosity", vec![ctx.verbosity.to_string()]);
    vars.insert(
        "clean",
        if ctx.clean {
            vec!["-c".to_string()]
        } else {
            vec![]
        },
    );
    vars.insert(
        "decision_rules",
        match &ctx.decision_rules {
            Some(rules) => vec!["-D".to_string(), path_arg(rules)],
            None => vec![],
        },
    );
    for name in ["input", "step", "classif", "out_fasta", "out_classif"] {
        vars.insert(name, vec![]);
    }
    vars
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn expect_outputs(tool: &ExternalTool, outputs: &[&Path]) -> Result<()> {
    for output in outputs {
        if !output.is_file() {
            return Err(PipelineError::MissingArtifact(format!(
                "{} did not produce {}",
                tool.name(),
                output.display()
            )));
        }
    }
    Ok(())
}

pub struct ExternalFeatureDetector {
    tool: ExternalTool,
}

impl ExternalFeatureDetector {
    pub fn new(template: ToolTemplate) -> Self {
        Self {
            tool: ExternalTool::new(template),
        }
    }
}

#[async_trait]
impl FeatureDetector for ExternalFeatureDetector {
    async fn run(&self, sequences: &SequenceCollection, ctx: &StageContext) -> Result<()> {
        let mut vars = base_vars(ctx);
        vars.insert("input", vec![path_arg(sequences.path())]);
        self.tool.invoke(&vars, &ctx.work_dir).await?;
        Ok(())
    }
}

/// Classifier writing `<project>.classif` into the working directory
pub struct ExternalClassifier {
    tool: ExternalTool,
}

impl ExternalClassifier {
    pub fn new(template: ToolTemplate) -> Self {
        Self {
            tool: ExternalTool::new(template),
        }
    }
}

#[async_trait]
impl Classifier for ExternalClassifier {
    async fn run(
        &self,
        sequences: &SequenceCollection,
        ctx: &StageContext,
        step: ClassifierStep,
    ) -> Result<PathBuf> {
        let mut vars = base_vars(ctx);
        vars.insert("input", vec![path_arg(sequences.path())]);
        vars.insert("step", step.args());
        self.tool.invoke(&vars, &ctx.work_dir).await?;

        let classif = artifact::merged_classif(&ctx.work_dir, &ctx.project);
        if step.produces_classification() {
            expect_outputs(&self.tool, &[&classif])?;
        }
        Ok(classif)
    }
}

pub struct ExternalRedundancyRemover {
    tool: ExternalTool,
}

impl ExternalRedundancyRemover {
    pub fn new(template: ToolTemplate) -> Self {
        Self {
            tool: ExternalTool::new(template),
        }
    }
}

#[async_trait]
impl RedundancyRemover for ExternalRedundancyRemover {
    async fn run(
        &self,
        sequences: &SequenceCollection,
        classif: &Path,
        output: &Path,
        ctx: &StageContext,
    ) -> Result<SequenceCollection> {
        let mut vars = base_vars(ctx);
        vars.insert("input", vec![path_arg(sequences.path())]);
        vars.insert("classif", vec![path_arg(classif)]);
        vars.insert("out_fasta", vec![path_arg(output)]);
        self.tool.invoke(&vars, &ctx.work_dir).await?;

        expect_outputs(&self.tool, &[output])?;
        Ok(SequenceCollection::new(output))
    }
}

fn pair_vars(ctx: &StageContext, input: &ArtifactPair, output: &ArtifactPair) -> ToolVars {
    let mut vars = base_vars(ctx);
    vars.insert("input", vec![path_arg(&input.sequence_path)]);
    vars.insert("classif", vec![path_arg(&input.classif_path)]);
    vars.insert("out_fasta", vec![path_arg(&output.sequence_path)]);
    vars.insert("out_classif", vec![path_arg(&output.classif_path)]);
    vars
}

/// Rewrites headers with the Wicker code of their classification
pub struct ExternalHeaderAnnotator {
    tool: ExternalTool,
}

impl ExternalHeaderAnnotator {
    pub fn new(template: ToolTemplate) -> Self {
        Self {
            tool: ExternalTool::new(template),
        }
    }
}

#[async_trait]
impl HeaderAnnotator for ExternalHeaderAnnotator {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        ctx: &StageContext,
    ) -> Result<ArtifactPair> {
        self.tool
            .invoke(&pair_vars(ctx, input, output), &ctx.work_dir)
            .await?;
        expect_outputs(&self.tool, &[&output.sequence_path, &output.classif_path])?;
        Ok(output.clone())
    }
}

pub struct ExternalBestHitAnnotator {
    tool: ExternalTool,
}

impl ExternalBestHitAnnotator {
    pub fn new(template: ToolTemplate) -> Self {
        Self {
            tool: ExternalTool::new(template),
        }
    }
}

#[async_trait]
impl BestHitAnnotator for ExternalBestHitAnnotator {
    async fn run(
        &self,
        input: &ArtifactPair,
        output: &ArtifactPair,
        ctx: &StageContext,
    ) -> Result<ArtifactPair> {
        self.tool
            .invoke(&pair_vars(ctx, input, output), &ctx.work_dir)
            .await?;
        expect_outputs(&self.tool, &[&output.sequence_path, &output.classif_path])?;
        Ok(output.clone())
    }
}
