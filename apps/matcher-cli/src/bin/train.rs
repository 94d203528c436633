use std::env;

use matcher_cli::{init_tracing, print_json, report_error, run_train, App};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut force = false;
    let mut validate = false;
    let mut verbose = false;
    for arg in &args {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            "--validate" => validate = true,
            "--verbose" | "-v" => verbose = true,
            other => {
                eprintln!("Unknown argument: {other}\nUsage: matcher-train [--force] [--validate] [-v]");
                std::process::exit(2);
            }
        }
    }
    init_tracing(verbose);

    let result = App::load().and_then(|app| run_train(&app, force, validate)).and_then(|report| print_json(&report));
    if let Err(err) = result {
        report_error(&err);
        std::process::exit(1);
    }
}
