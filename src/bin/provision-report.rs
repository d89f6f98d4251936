use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use provision_report::{decode_file, verify_file, Aggregate};

fn main() -> ExitCode {
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    if args.len() < 3 {
        return Err("not enough arguments".to_string());
    }
    if args.len() > 3 {
        return Err(format!("unexpected argument '{}'", args[3]));
    }

    let command = args[1].as_str();
    let file = PathBuf::from(&args[2]);

    match command {
        "render" => run_render(&file),
        "summary" => run_summary(&file),
        "verify" => run_verify(&file),
        _ => Err(format!("unknown command '{command}'")),
    }
}

fn run_render(file: &Path) -> Result<(), String> {
    let aggregate = decode_file(file).map_err(|e| e.to_string())?;
    println!("{}", aggregate.message());
    Ok(())
}

fn run_summary(file: &Path) -> Result<(), String> {
    let aggregate = decode_file(file).map_err(|e| e.to_string())?;
    let report = aggregate.report();
    let duplicates = report
        .entries()
        .iter()
        .filter(|e| e.duplicate_of().is_some())
        .count();
    println!("kind: {}", aggregate.kind());
    println!("errors: {}", report.len());
    println!("duplicates: {duplicates}");
    match aggregate.cause() {
        Some(cause) => println!("cause: {cause}"),
        None => println!("cause: none"),
    }
    Ok(())
}

fn run_verify(file: &Path) -> Result<(), String> {
    verify_file(file).map_err(|e| e.to_string())?;
    println!("OK");
    Ok(())
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  provision-report render <file>");
    eprintln!("  provision-report summary <file>");
    eprintln!("  provision-report verify <file>");
    eprintln!();
    eprintln!("<file> holds a transport token produced by provision_report::transport::encode.");
}
