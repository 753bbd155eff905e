use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Root for every persisted artifact (state, traces, audit, memory db).
    pub data_dir: PathBuf,
    pub llm: LlmConfig,
    pub limbic: LimbicConfig,
    pub memory: MemoryConfig,
    pub safety: SafetyConfig,
    pub pipeline: PipelineConfig,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("hearth_data"),
            llm: LlmConfig::default(),
            limbic: LimbicConfig::default(),
            memory: MemoryConfig::default(),
            safety: SafetyConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl HearthConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: HearthConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HEARTH_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HEARTH_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("HEARTH_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("HEARTH_TURN_DEADLINE_MS") {
            if let Ok(n) = v.parse() {
                self.pipeline.turn_deadline_ms = n;
            }
        }
        if let Ok(v) = std::env::var("HEARTH_WORKSPACE_ROOT") {
            self.safety.workspace_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HEARTH_SANDBOX_DIR") {
            self.safety.sandbox_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("HEARTH_WRITE_WHITELIST") {
            self.safety.write_whitelist = std::env::split_paths(&v).collect();
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.limbic.state_file)
    }

    pub fn memory_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.memory.db_file)
    }

    pub fn snapshot_history_path(&self) -> PathBuf {
        self.data_dir.join("snapshots").join("history.jsonl")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("audit").join("tools.jsonl")
    }

    pub fn trace_log_path(&self) -> PathBuf {
        self.data_dir.join("traces").join("traces.jsonl")
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "hearth-mock".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimbicConfig {
    pub state_file: String,
    /// Arousal decays toward this floor.
    pub arousal_floor: f32,
    /// Fraction of the distance to the floor removed per elapsed day.
    pub arousal_decay_per_day: f32,
    /// Valence drifts toward this baseline.
    pub valence_baseline: f32,
    /// Exponential drift rate of valence per elapsed hour.
    pub valence_drift_per_hour: f32,
    /// Period of the background maintenance loop.
    pub maintenance_interval_secs: u64,
}

impl Default for LimbicConfig {
    fn default() -> Self {
        Self {
            state_file: "limbic_state.json".to_string(),
            arousal_floor: 0.2,
            arousal_decay_per_day: 0.5,
            valence_baseline: 0.0,
            valence_drift_per_hour: 0.05,
            maintenance_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub db_file: String,
    pub collection: String,
    pub retrieval_limit: usize,
    pub embedding_dim: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_file: "memory.db".to_string(),
            collection: "memories".to_string(),
            retrieval_limit: 5,
            embedding_dim: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Relative tool paths resolve against this directory.
    pub workspace_root: PathBuf,
    /// Directories an Associate may write into.
    pub write_whitelist: Vec<PathBuf>,
    /// The only working directory shell commands may use below Surrogate.
    pub sandbox_dir: PathBuf,
    /// Prefix of automatic safety-net commit messages.
    pub snapshot_marker: String,
    pub shell_timeout_secs: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            write_whitelist: vec![],
            sandbox_dir: PathBuf::from("sandbox"),
            snapshot_marker: "[hearth-safety-net]".to_string(),
            shell_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Soft deadline shared by the generation calls of one turn.
    pub turn_deadline_ms: u64,
    /// How long the heuristic scan waits for the deep perception pass.
    pub deep_perception_timeout_ms: u64,
    pub max_candidates: usize,
    /// Top-2 candidates closer than this (under low urgency) are blended.
    pub synthesis_margin: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            turn_deadline_ms: 8_000,
            deep_perception_timeout_ms: 1_500,
            max_candidates: 3,
            synthesis_margin: 0.05,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = HearthConfig::default();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.memory.retrieval_limit, 5);
        assert_eq!(cfg.pipeline.max_candidates, 3);
        assert_eq!(cfg.state_path(), PathBuf::from("hearth_data/limbic_state.json"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
data_dir = "/var/lib/hearth"

[limbic]
arousal_floor = 0.1
"#;
        let cfg: HearthConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/hearth"));
        assert!((cfg.limbic.arousal_floor - 0.1).abs() < 1e-6);
        // Defaults for unspecified fields
        assert!((cfg.limbic.valence_drift_per_hour - 0.05).abs() < 1e-6);
        assert_eq!(cfg.safety.snapshot_marker, "[hearth-safety-net]");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
data_dir = "data"

[llm]
provider = "mock"
model = "tiny"
max_tokens = 256
temperature = 0.2

[limbic]
state_file = "state.json"
arousal_floor = 0.15
arousal_decay_per_day = 0.3
valence_baseline = 0.1
valence_drift_per_hour = 0.02
maintenance_interval_secs = 60

[memory]
db_file = "mem.db"
collection = "journal"
retrieval_limit = 8
embedding_dim = 128

[safety]
workspace_root = "/work"
write_whitelist = ["/work/notes", "/work/drafts"]
sandbox_dir = "/work/sandbox"
snapshot_marker = "[auto]"
shell_timeout_secs = 5

[pipeline]
turn_deadline_ms = 2000
deep_perception_timeout_ms = 300
max_candidates = 4
synthesis_margin = 0.1
"#;
        let cfg: HearthConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.max_tokens, 256);
        assert_eq!(cfg.limbic.maintenance_interval_secs, 60);
        assert_eq!(cfg.memory.collection, "journal");
        assert_eq!(cfg.safety.write_whitelist.len(), 2);
        assert_eq!(cfg.pipeline.max_candidates, 4);
        assert_eq!(cfg.memory_db_path(), PathBuf::from("data/mem.db"));
        assert_eq!(cfg.trace_log_path(), PathBuf::from("data/traces/traces.jsonl"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "[pipeline]\nmax_candidates = 2\n").unwrap();
        let cfg = HearthConfig::load(&path).unwrap();
        assert_eq!(cfg.pipeline.max_candidates, 2);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("HEARTH_LLM_MODEL", "override-model");
        std::env::set_var("HEARTH_TURN_DEADLINE_MS", "1234");

        let mut cfg = HearthConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.llm.model, "override-model");
        assert_eq!(cfg.pipeline.turn_deadline_ms, 1234);

        std::env::remove_var("HEARTH_LLM_MODEL");
        std::env::remove_var("HEARTH_TURN_DEADLINE_MS");

        // Nonexistent path returns defaults
        let cfg = HearthConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.llm.model, "hearth-mock");
    }
}
