//! CLI entry point for storyweave
//!
//! This provides command-line interface for package validation and play.

use std::fs;
use std::path::PathBuf;
use std::process;
use storyweave::debug::{self, DebugConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];
    let debug = args.iter().skip(2).any(|arg| arg == "--debug");
    init_logging(debug);

    match command.as_str() {
        "play" => {
            let file_path = require_path(&args);
            run_play(file_path, debug).await;
        }
        "check" => {
            let file_path = require_path(&args);
            run_check(file_path);
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Error: Unknown command '{command}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("storyweave - Narrative event scheduler");
    println!();
    println!("USAGE:");
    println!("    storyweave play <package.json> [--debug]");
    println!("    storyweave check <package.json>");
    println!();
    println!("COMMANDS:");
    println!("    play <file> [--debug]    Play a story package in the terminal");
    println!("    check <file>             Validate a story package");
    println!("    --help, -h               Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --debug    Show engine diagnostics and actor/camera/effect calls");
    println!();
    println!("ENVIRONMENT:");
    println!("    {}    Enable debug logging", debug::DEBUG_ENV);
}

fn init_logging(debug: bool) {
    let mut config = DebugConfig::default();
    if debug {
        config.enabled = true;
        config = config.all_categories();
    }
    if let Err(err) = debug::init(config) {
        eprintln!("Warning: {err}");
    }
}

fn require_path(args: &[String]) -> PathBuf {
    match args.get(2).filter(|arg| !arg.starts_with("--")) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Error: Missing package file path");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn read_package(file_path: &PathBuf) -> String {
    match fs::read_to_string(file_path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error: Failed to read file '{}'", file_path.display());
            eprintln!("Reason: {err}");
            process::exit(1);
        }
    }
}

async fn run_play(file_path: PathBuf, debug: bool) {
    let json = read_package(&file_path);
    let save_dir = file_path
        .parent()
        .map(|dir| dir.join("saves"))
        .unwrap_or_else(|| PathBuf::from("saves"));

    if let Err(err) = storyweave::cli::play::run_play(&json, debug, save_dir).await {
        eprintln!("Error: Player mode failed");
        eprintln!("Reason: {err}");
        process::exit(1);
    }
}

fn run_check(file_path: PathBuf) {
    let json = read_package(&file_path);
    match storyweave::cli::check::run_check(&json) {
        Ok(result) if result.has_errors() => process::exit(2),
        Ok(_) => {}
        Err(err) => {
            eprintln!("Error: Failed to check '{}'", file_path.display());
            eprintln!("Reason: {err}");
            process::exit(1);
        }
    }
}
