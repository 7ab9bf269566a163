use anyhow::Context;
use compcore::interface::{AveragingMethod, ReduceRequest};
use compcore::processing::ReduceOptions;
use compcore::{InstrumentContext, WaveType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::generator::profile::GeneratorConfig;

/// Run description: which (date, wave type, method) units to reduce and how.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub dates: Vec<String>,
    pub wave_types: Vec<WaveType>,
    pub methods: Vec<AveragingMethod>,
    pub synoptic: bool,
    pub synthetic: bool,
    pub output: PathBuf,
    /// Dates reduced concurrently.
    pub jobs: usize,
    /// JSON instrument context; built-in calibration when absent.
    pub context: Option<PathBuf>,
    pub options: ReduceOptions,
    pub generator: GeneratorConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dates: Vec::new(),
            wave_types: vec![WaveType::Fe1074],
            methods: vec![AveragingMethod::Median],
            synoptic: true,
            synthetic: false,
            output: PathBuf::from("output"),
            jobs: 1,
            context: None,
            options: ReduceOptions::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn load_context(&self) -> anyhow::Result<InstrumentContext> {
        match &self.context {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("reading instrument context {}", path.display()))?;
                InstrumentContext::from_json(&contents)
                    .with_context(|| format!("parsing instrument context {}", path.display()))
            }
            None => Ok(InstrumentContext::default()),
        }
    }

    /// Every (date, wave type, method) combination, dates outermost.
    pub fn requests(&self) -> Vec<ReduceRequest> {
        let mut requests = Vec::new();
        for date in &self.dates {
            for &wave_type in &self.wave_types {
                for &method in &self.methods {
                    requests.push(ReduceRequest {
                        date: date.clone(),
                        wave_type,
                        method,
                        synoptic: self.synoptic,
                        synthetic: self.synthetic,
                    });
                }
            }
        }
        requests
    }
}
