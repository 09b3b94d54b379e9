use opengex_rust::error::DdlError;
use opengex_rust::scene::Scene;
use opengex_rust::{opengex, parse_ddl, ImportOptions};

use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

/// Reads OpenGEX from stdin, prints the parsed document as JSON and reports
/// import errors on stderr.
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut input = Vec::new();
    if let Err(err) = io::stdin().read_to_end(&mut input) {
        eprintln!("failed to read stdin: {}", err);
        std::process::exit(2);
    }

    let document = match parse_ddl(&input) {
        Ok(document) => document,
        Err(err) => {
            report_parse_error(&input, &err);
            std::process::exit(1);
        }
    };
    println!("{}", document.to_json_pretty());

    let (scene, _, errors) = opengex::interpret(&document, Scene::new(), &ImportOptions::default());
    tracing::info!(
        nodes = scene.nodes().len(),
        resources = scene.resources().len(),
        "import finished"
    );
    if errors.is_empty() {
        return;
    }
    for err in &errors {
        eprintln!("{} ({})", err, err.code());
    }
    std::process::exit(1);
}

fn report_parse_error(input: &[u8], err: &DdlError) {
    let text = String::from_utf8_lossy(input);
    let lines: Vec<&str> = text.lines().collect();
    let line_num = err.begin.line;
    let line_text = lines.get(line_num).copied().unwrap_or("");

    eprintln!("ERROR AT LINE {}:", line_num + 1);
    eprintln!("{}", line_text);

    let start_col = err.begin.column;
    let end_col = if err.begin.line == err.end.line && err.end.column > err.begin.column {
        err.end.column
    } else if start_col < line_text.len() {
        // Point error or multi-line span: underline to end of line.
        line_text.len()
    } else {
        start_col + 1
    };

    let mut underline = " ".repeat(start_col);
    underline.push('^');
    if end_col > start_col + 1 {
        underline.push_str(&"_".repeat(end_col - start_col - 1));
    }

    eprintln!("{}", underline);
    eprintln!("{} ({})", err.message, err.code);
    eprintln!();
}
