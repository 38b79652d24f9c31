use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Embeddable scripting and templating language", long_about = None)]
pub struct Args {
    /// JSON file whose contents seed the root context.
    #[arg(short, long, value_name = "JSON_FILE", global = true)]
    pub data: Option<PathBuf>,

    /// Directory `include` paths are resolved against; defaults to the
    /// directory of the script.
    #[arg(long = "include-root", value_name = "DIR", global = true)]
    pub include_root: Option<PathBuf>,

    #[arg(long = "max-depth", value_name = "N", global = true)]
    pub max_depth: Option<usize>,

    #[arg(long = "color", value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorChoice,

    #[arg(long = "compact", global = true)]
    pub compact: bool,

    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a script and print its value as JSON.
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Evaluate a template and print the rendered text.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Evaluate inline source.
    Eval {
        #[arg(value_name = "SOURCE")]
        source: String,
    },
    /// Print shell completions.
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

impl Args {
    /// Directory of the script named on the command line, if any.
    pub fn script_dir(&self) -> Option<PathBuf> {
        match &self.command {
            Commands::Run { file } | Commands::Render { file } => file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}
