//! # Quill Console
//!
//! Main entry point for the interactive tab console.

use cli_console::{bootstrap, persist, ConsoleConfig};
use services_logger::init_tracing;
use std::env;
use std::io;
use std::path::PathBuf;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    init_tracing(services_logger::DEFAULT_FILTER);

    let mut console = bootstrap(&config).unwrap_or_else(|e| {
        eprintln!("Failed to start console: {}", e);
        process::exit(1);
    });

    let stdin = io::stdin();
    if let Err(e) = console.run(stdin.lock(), io::stdout()) {
        eprintln!("Console error: {}", e);
        process::exit(1);
    }

    if let Err(e) = persist(&console, &config) {
        eprintln!("Failed to save state: {}", e);
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<ConsoleConfig, String> {
    let mut config = ConsoleConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--settings" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --settings".to_string());
                }
                config.settings_path = Some(PathBuf::from(&args[i]));
            }
            "--metadata" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --metadata".to_string());
                }
                config.metadata_path = Some(PathBuf::from(&args[i]));
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}", other));
            }
            file => config.files.push(PathBuf::from(file)),
        }
        i += 1;
    }

    Ok(config)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS] [FILE]...", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --settings <FILE>   Settings overrides (JSON), saved on exit");
    eprintln!("  --metadata <FILE>   Per-file metadata (JSON), saved on exit");
    eprintln!("  -h, --help          Show this help message");
    eprintln!();
    eprintln!("Type `list`, `open <path>`, `save <n>`, `close <n>` or `quit` at the prompt.");
}
