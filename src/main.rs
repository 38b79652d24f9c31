use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;

use quill::cli::{generate_completions, Args, Commands};
use quill::config::AppConfig;
use quill::diagnostic::render_diagnostics;
use quill::format::value_to_json_string;
use quill::interpreter::Error;
use quill::{convert, logging, Context, Engine};

fn main() {
    let args = Args::parse();

    if let Commands::Complete { shell } = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    logging::init(config.verbose);

    let root = match load_root(&config) {
        Ok(root) => root,
        Err(e) => {
            error_message(&config, &e);
            process::exit(1);
        }
    };

    let engine = Engine::with_config(config.engine.clone());
    match &args.command {
        Commands::Run { file } => {
            let source = read_source(&config, file);
            let result = engine.run(&source, &root);
            finish_value(&config, &source, &file.display().to_string(), result);
        }
        Commands::Eval { source } => {
            let result = engine.run(source, &root);
            finish_value(&config, source, "<eval>", result);
        }
        Commands::Render { file } => {
            let source = read_source(&config, file);
            match engine.render(&source, &root) {
                Ok(text) => write_output(&text),
                Err(e) => report(&config, &source, &file.display().to_string(), &e),
            }
        }
        Commands::Complete { .. } => {}
    }
}

fn load_root(config: &AppConfig) -> Result<Context, String> {
    let Some(path) = &config.data else {
        return Ok(Context::new());
    };
    tracing::debug!(path = %path.display(), "loading data file");
    convert::load_data_file(path)
}

fn read_source(config: &AppConfig, path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            error_message(config, &format!("Failed to read {}: {}", path.display(), e));
            process::exit(1);
        }
    }
}

fn finish_value(config: &AppConfig, source: &str, file_name: &str, result: Result<quill::Value, Error>) {
    match result {
        Ok(value) => {
            let mut text = value_to_json_string(&value, config.compact);
            text.push('\n');
            write_output(&text);
        }
        Err(e) => report(config, source, file_name, &e),
    }
}

fn write_output(text: &str) {
    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn report(config: &AppConfig, source: &str, file_name: &str, error: &Error) -> ! {
    let rendered = render_diagnostics(source, file_name, &[error.to_diagnostic()], config.color_enabled);
    eprint!("{}", rendered);
    process::exit(1);
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
