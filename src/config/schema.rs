//! Configuration schema for nyx.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so that the JSON config
//! file can use camelCase keys while Rust code uses snake_case fields. Every
//! field has a default, so a partial config file is always valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::token_budget::PromptBudget;
use crate::utils::helpers::expand_tilde;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Where the durable session record lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: String,
}

fn default_session_path() -> String {
    "~/.nyx/nyx_memory.json".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl SessionConfig {
    /// Session file path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        expand_tilde(&self.path)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Settings for launching a local llama.cpp server at startup.
///
/// Hardware-acceleration parameters are applied once here, outside the
/// turn loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlamaServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_server_binary")]
    pub binary: String,
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,
    #[serde(default)]
    pub main_gpu: u32,
    #[serde(default = "default_tensor_split")]
    pub tensor_split: Vec<f32>,
    /// Worker threads; `None` uses every available core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_server_binary() -> String {
    "llama-server".to_string()
}

fn default_model_path() -> String {
    "~/.nyx/models/Nyx_Brain.gguf".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_context_window() -> usize {
    8192
}

fn default_gpu_layers() -> u32 {
    49
}

fn default_tensor_split() -> Vec<f32> {
    vec![0.5, 0.5]
}

fn default_startup_timeout_secs() -> u64 {
    120
}

impl Default for LlamaServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: default_server_binary(),
            model_path: default_model_path(),
            port: default_server_port(),
            context_window: default_context_window(),
            gpu_layers: default_gpu_layers(),
            main_gpu: 0,
            tensor_split: default_tensor_split(),
            threads: None,
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

impl LlamaServerConfig {
    pub fn resolved_model_path(&self) -> PathBuf {
        expand_tilde(&self.model_path)
    }

    /// Configured thread count, or the number of available cores.
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

/// Inference engine connection and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub server: LlamaServerConfig,
}

fn default_api_base() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            server: LlamaServerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Base URL to talk to. A managed server always listens on localhost.
    pub fn endpoint(&self) -> String {
        if self.server.enabled {
            format!("http://127.0.0.1:{}", self.server.port)
        } else {
            self.api_base.trim_end_matches('/').to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// Prompt assembly and response shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfig {
    /// Token ceiling for the assembled prompt.
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
    /// Maximum number of past turns considered before the budget walk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
    #[serde(default = "default_preamble")]
    pub preamble: String,
    #[serde(default = "default_stop_markers")]
    pub stop_markers: Vec<String>,
    #[serde(default = "default_strip_markers")]
    pub strip_markers: Vec<String>,
    #[serde(default = "default_rephrase_instruction")]
    pub rephrase_instruction: String,
}

fn default_budget_tokens() -> usize {
    PromptBudget::from_context(default_context_window(), default_max_tokens() as usize).limit()
}

fn default_preamble() -> String {
    "You are Nyx, an advanced AI assistant running on a secure, privileged local system. \
     You specialize in cybersecurity, red team, blue team, and purple team operations. \
     You **can** execute shell commands, access system information, modify files, and \
     perform tasks if the user requests them explicitly. You do **not** refuse actions \
     unless they pose a risk or are clearly unauthorized. Be helpful, efficient, and \
     clear in your output."
        .to_string()
}

fn default_stop_markers() -> Vec<String> {
    vec!["User:".to_string()]
}

fn default_strip_markers() -> Vec<String> {
    vec![
        "<thinking>".to_string(),
        "</thinking>".to_string(),
        "<unk>".to_string(),
    ]
}

fn default_rephrase_instruction() -> String {
    "(Do not repeat yourself. Rephrase your answer.)".to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            budget_tokens: default_budget_tokens(),
            history_window: None,
            preamble: default_preamble(),
            stop_markers: default_stop_markers(),
            strip_markers: default_strip_markers(),
            rephrase_instruction: default_rephrase_instruction(),
        }
    }
}

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Operator console keywords and presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    #[serde(default = "default_exit_keywords")]
    pub exit_keywords: Vec<String>,
    #[serde(default = "default_status_keyword")]
    pub status_keyword: String,
    #[serde(default = "default_escape_prefix")]
    pub escape_prefix: String,
    #[serde(default = "default_indicator_interval_ms")]
    pub indicator_interval_ms: u64,
    /// Per-character delay when printing responses; 0 prints at once.
    #[serde(default = "default_typewriter_delay_ms")]
    pub typewriter_delay_ms: u64,
    #[serde(default = "default_true")]
    pub show_thoughts: bool,
}

fn default_exit_keywords() -> Vec<String> {
    vec!["exit".to_string(), "quit".to_string()]
}

fn default_status_keyword() -> String {
    "!sysinfo".to_string()
}

fn default_escape_prefix() -> String {
    "!".to_string()
}

fn default_indicator_interval_ms() -> u64 {
    70
}

fn default_typewriter_delay_ms() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            exit_keywords: default_exit_keywords(),
            status_keyword: default_status_keyword(),
            escape_prefix: default_escape_prefix(),
            indicator_interval_ms: default_indicator_interval_ms(),
            typewriter_delay_ms: default_typewriter_delay_ms(),
            show_thoughts: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// Root configuration for nyx.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}
