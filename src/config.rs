use std::path::PathBuf;

use crate::cli::{Args, ColorChoice};

/// Default bound on nested script calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 100;

/// Settings of one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory `include` paths are resolved against.
    pub include_root: PathBuf,
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_root: PathBuf::from("."),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn with_include_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.include_root = root.into();
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.max(1);
        self
    }
}

pub struct AppConfig {
    pub color_enabled: bool,
    pub compact: bool,
    pub verbose: bool,
    pub data: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr) && atty::is(atty::Stream::Stdout),
        };

        let mut engine = EngineConfig::default();
        if let Some(root) = args.include_root.clone().or_else(|| args.script_dir()) {
            engine = engine.with_include_root(root);
        }
        if let Some(depth) = args.max_depth {
            engine = engine.with_max_call_depth(depth);
        }

        AppConfig {
            color_enabled,
            compact: args.compact,
            verbose: args.verbose,
            data: args.data.clone(),
            engine,
        }
    }
}
