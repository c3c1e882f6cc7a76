use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bumpalo::Bump;
use clap::error::ErrorKind;
use clap::Parser as ArgParser;

use hlslparser::descriptor;
use hlslparser::{parse, StringPool};

/// Output HLSL parsing results to JSON.
#[derive(ArgParser)]
#[command(name = "hlslparser", disable_version_flag = true)]
struct Args {
    /// Input file name
    filename: PathBuf,
    /// Entry point of the shader
    entryname: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return if error.kind() == ErrorKind::DisplayHelp {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    if !args.filename.exists() {
        eprintln!("File does not exist");
        return ExitCode::FAILURE;
    }
    let source = match fs::read_to_string(&args.filename) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Failed to read {}: {}", args.filename.display(), error);
            return ExitCode::FAILURE;
        }
    };

    let file_name = args.filename.display().to_string();
    let bump = Bump::new();
    let pool = StringPool::new(&bump);

    let tree = match parse(&pool, &file_name, &source) {
        Ok(tree) => tree,
        Err(_) => {
            // The diagnostic is already on the error stream.
            eprintln!("Parsing failed, aborting");
            return ExitCode::FAILURE;
        }
    };

    if tree.find_function(&args.entryname).is_none() {
        eprintln!("Entry point '{}' not found", args.entryname);
        return ExitCode::FAILURE;
    }

    let output = descriptor::tree_to_json(&tree);
    let text = match serde_json::to_string_pretty(&output) {
        Ok(text) => text,
        Err(_) => {
            eprintln!("Failed to output analysis");
            return ExitCode::FAILURE;
        }
    };
    if fs::write(format!("{}.analysis", file_name), text).is_err() {
        eprintln!("Failed to output analysis");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
