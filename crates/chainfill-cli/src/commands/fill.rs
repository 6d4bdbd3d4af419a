//! Fill command

use chainfill_filler::{BlockchainFiller, BlockchainTest};
use chainfill_forks::{fork_by_name, Fork};
use chainfill_t8n::{ExternalTransitionTool, T8nConfig};
use clap::Args;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{CliError, Config, Output};

/// Arguments of `chainfill fill`
#[derive(Debug, Args)]
pub struct FillArgs {
    /// Test definition (JSON)
    pub test: PathBuf,

    /// Fork to fill for (repeatable)
    #[arg(long = "fork", required = true)]
    pub forks: Vec<String>,

    /// Extra EIP to enable on every fork (repeatable)
    #[arg(long = "eip")]
    pub eips: Vec<u32>,

    /// Emit engine-API payload fixtures
    #[arg(long)]
    pub hive: bool,

    /// Transition tool binary
    #[arg(long)]
    pub evm_bin: Option<PathBuf>,

    /// Seconds before a transition tool call is killed
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Collect execution traces for failure diagnostics
    #[arg(long)]
    pub trace: bool,

    /// Write every transition tool input and output under this directory
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,

    /// Override the chain id of the test definition
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Write fixtures here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl FillArgs {
    /// Config values overridden by flags
    fn t8n_config(&self, config: &Config) -> T8nConfig {
        let mut t8n = config.t8n_config();
        if let Some(bin) = &self.evm_bin {
            t8n.binary = bin.clone();
        }
        if let Some(timeout) = self.timeout {
            t8n.timeout_secs = timeout;
        }
        if self.trace {
            t8n.trace = true;
        }
        if let Some(dir) = &self.debug_dir {
            t8n.debug_dir = Some(dir.clone());
        }
        t8n
    }
}

/// Read and parse a test definition, naming it after the file when untagged
pub fn load_test(path: &Path) -> Result<BlockchainTest, CliError> {
    let content = std::fs::read_to_string(path)?;
    let mut test: BlockchainTest = serde_json::from_str(&content)
        .map_err(|e| CliError::InvalidInput(format!("{}: {}", path.display(), e)))?;
    if test.tag.is_empty() {
        test.tag = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
    }
    Ok(test)
}

/// Key of one fixture in the output object
pub fn fixture_key(tag: &str, network: &str) -> String {
    format!("{}__fork_{}", tag, network)
}

/// Fill the test for every fork and write all fixtures as one JSON object.
///
/// Forks fill independently: fixtures that succeed are written even when
/// another fork fails, and the command then reports the failure count.
pub async fn execute(args: FillArgs, config: &Config, json: bool) -> Result<(), CliError> {
    let mut test = load_test(&args.test)?;
    if let Some(chain_id) = args.chain_id.or(config.chain_id) {
        test.chain_id = chain_id;
    }
    let test = Arc::new(test);

    let forks = args
        .forks
        .iter()
        .map(|name| fork_by_name(name).map_err(|_| CliError::UnknownFork(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let t8n_config = args.t8n_config(config);
    let mut handles = Vec::with_capacity(forks.len());
    for fork in forks {
        let test = Arc::clone(&test);
        let eips = args.eips.clone();
        let mut t8n_config = t8n_config.clone();
        // Keep debug dumps of different forks apart
        if let Some(dir) = &t8n_config.debug_dir {
            t8n_config.debug_dir = Some(dir.join(fork.name()));
        }
        let hive = args.hive;
        // The transition tool drives its own runtime, so fills run off the async workers
        handles.push(tokio::task::spawn_blocking(move || {
            fill_one(fork.as_ref(), &test, eips, t8n_config, hive)
        }));
    }

    let total = handles.len();
    let mut fixtures = Map::new();
    let mut failed = 0;
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| CliError::InvalidInput(format!("fill task aborted: {}", e)))?;
        match outcome {
            Ok((network, fixture)) => {
                fixtures.insert(fixture_key(&test.tag, &network), fixture);
            }
            Err((network, reason)) => {
                tracing::error!(network = %network, "{}", reason);
                failed += 1;
            }
        }
    }

    let rendered = serde_json::to_string_pretty(&Value::Object(fixtures))?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            Output::new(json)
                .field("output", &path.display().to_string())
                .field_u64("filled", (total - failed) as u64)
                .field_u64("failed", failed as u64)
                .message(&format!(
                    "Filled {} of {} fixtures into {}",
                    total - failed,
                    total,
                    path.display()
                ))
                .print();
        }
        None => println!("{}", rendered),
    }

    if failed > 0 {
        return Err(CliError::Fill { failed, total });
    }
    Ok(())
}

/// Fill one fork; failures carry the network label and the rendered error
fn fill_one(
    fork: &dyn Fork,
    test: &BlockchainTest,
    eips: Vec<u32>,
    t8n_config: T8nConfig,
    hive: bool,
) -> Result<(String, Value), (String, String)> {
    let t8n = ExternalTransitionTool::new(t8n_config);
    let filler = BlockchainFiller::new(fork, &t8n).with_eips(eips);
    let network = filler.network();
    let fixture = if hive {
        filler
            .fill_hive(test)
            .map_err(|e| e.to_string())
            .and_then(|f| serde_json::to_value(f).map_err(|e| e.to_string()))
    } else {
        filler
            .fill(test)
            .map_err(|e| e.to_string())
            .and_then(|f| serde_json::to_value(f).map_err(|e| e.to_string()))
    };
    fixture.map(|f| (network.clone(), f)).map_err(|e| (network, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_key() {
        assert_eq!(fixture_key("transfer", "Cancun"), "transfer__fork_Cancun");
        assert_eq!(
            fixture_key("transfer", "Cancun+1153"),
            "transfer__fork_Cancun+1153"
        );
    }

    #[test]
    fn test_load_test_defaults_tag_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simple_transfer.json");
        std::fs::write(&path, r#"{"pre": {}, "blocks": []}"#).unwrap();
        let test = load_test(&path).unwrap();
        assert_eq!(test.tag, "simple_transfer");
        assert_eq!(test.chain_id, 1);
    }

    #[test]
    fn test_load_test_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(load_test(&path), Err(CliError::InvalidInput(_))));
        assert!(matches!(
            load_test(&dir.path().join("missing.json")),
            Err(CliError::Io(_))
        ));
    }

    #[test]
    fn test_flags_override_config() {
        let args = FillArgs {
            test: PathBuf::from("t.json"),
            forks: vec!["Cancun".to_string()],
            eips: vec![],
            hive: false,
            evm_bin: Some(PathBuf::from("/usr/local/bin/evm")),
            timeout: Some(5),
            trace: true,
            debug_dir: None,
            chain_id: None,
            output: None,
        };
        let config = Config {
            timeout_secs: 30,
            debug_dir: Some(PathBuf::from("/tmp/dump")),
            ..Default::default()
        };
        let t8n = args.t8n_config(&config);
        assert_eq!(t8n.binary, PathBuf::from("/usr/local/bin/evm"));
        assert_eq!(t8n.timeout_secs, 5);
        assert!(t8n.trace);
        assert_eq!(t8n.debug_dir, Some(PathBuf::from("/tmp/dump")));
    }
}
