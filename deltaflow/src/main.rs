use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deltaflow::js::{Cfg, CfgDescription, CfgMap, NodeId};
use deltaflow::{AnalysisConfig, ScriptAnalysis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "deltaflow";

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct DeltaflowConfig {
    pub analysis: AnalysisConfig,
}

impl DeltaflowConfig {
    /// The stored configuration with command-line overrides applied.
    fn with_params(mut self, params: &DeltaflowParams) -> Self {
        if let Some(budget) = params.edge_budget {
            self.analysis = self.analysis.with_edge_budget(budget);
        }
        if let Some(ms) = params.timeout_ms {
            self.analysis = self.analysis.with_timeout(Duration::from_millis(ms));
        }
        self
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct DeltaflowParams {
    #[command(subcommand)]
    pub command: Commands,
    /// Edges a single worklist run may visit.
    #[arg(long, global = true)]
    pub edge_budget: Option<u64>,
    /// Wall-clock limit for one script, in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
    /// Write the effective configuration back to the config file.
    #[arg(long, global = true)]
    pub save: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a script given as JSON CFG descriptions
    Analyze {
        /// Node id of the script's root function.
        script: i32,
        /// Files holding one CFG description or an array of them.
        #[arg(required = true)]
        cfgs: Vec<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CfgFile {
    Many(Vec<CfgDescription>),
    One(Box<CfgDescription>),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let params = DeltaflowParams::parse();
    let stored: DeltaflowConfig =
        confy::load(APP_NAME, None).context("failed to load configuration")?;
    let config = stored.with_params(&params);
    if params.save {
        confy::store(APP_NAME, None, &config).context("failed to store configuration")?;
    }
    match params.command {
        Commands::Analyze { script, cfgs } => analyze(config, NodeId(script), &cfgs),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.analysis)?);
            Ok(())
        }
    }
}

fn load_cfgs(paths: &[PathBuf]) -> Result<CfgMap> {
    let mut descriptions = vec![];
    for path in paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file: CfgFile = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a cfg description", path.display()))?;
        match file {
            CfgFile::Many(many) => descriptions.extend(many),
            CfgFile::One(one) => descriptions.push(*one),
        }
    }
    let cfgs = descriptions
        .into_iter()
        .map(Cfg::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CfgMap::from_cfgs(cfgs)?)
}

fn analyze(config: DeltaflowConfig, script: NodeId, paths: &[PathBuf]) -> Result<()> {
    let cfgs = load_cfgs(paths)?;
    let analysis = ScriptAnalysis::new(cfgs, config.analysis);
    let result = analysis.analyze(script)?;
    println!("{result}");
    Ok(())
}
