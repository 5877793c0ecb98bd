//! Mock Kotlin linter binary for integration testing
//!
//! Implements just enough of a style checker to exercise the harness
//! without a real linter installed:
//!
//! - `mock-lint check [paths...]` reports violations, exits 1 if any
//! - `mock-lint format [paths...]` fixes them in place, exits 0
//! - `mock-lint hang` never exits
//!
//! Paths default to the current directory; directories are searched
//! recursively for `*.kt` files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const USAGE: &str = "usage: mock-lint <check|format|hang> [paths...]";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match args.split_first() {
        Some((mode, paths)) => match run(mode, paths) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("mock-lint: {}", e);
                3
            }
        },
        None => {
            eprintln!("{}", USAGE);
            2
        }
    };
    std::process::exit(code);
}

fn run(mode: &str, paths: &[String]) -> io::Result<i32> {
    match mode {
        "check" => check(&kotlin_files(paths)?),
        "format" => format(&kotlin_files(paths)?),
        "hang" => loop {
            std::thread::sleep(Duration::from_secs(60));
        },
        other => {
            eprintln!("unknown command '{}'\n{}", other, USAGE);
            Ok(2)
        }
    }
}

/// A single style problem
struct Violation {
    line: usize,
    col: usize,
    message: &'static str,
}

fn check(files: &[PathBuf]) -> io::Result<i32> {
    let mut found = 0;
    for file in files {
        let content = fs::read_to_string(file)?;
        for v in violations(&content) {
            println!("{}:{}:{}: {}", display(file), v.line, v.col, v.message);
            found += 1;
        }
    }
    Ok(if found == 0 { 0 } else { 1 })
}

fn format(files: &[PathBuf]) -> io::Result<i32> {
    let mut changed = 0;
    for file in files {
        let content = fs::read_to_string(file)?;
        let formatted = format_source(&content);
        if formatted != content {
            fs::write(file, formatted)?;
            changed += 1;
        }
    }
    println!("Formatted {} file(s)", changed);
    Ok(0)
}

fn violations(content: &str) -> Vec<Violation> {
    let mut found = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let indent = &line[..line.len() - line.trim_start().len()];
        if indent.contains('\t') {
            found.push(Violation {
                line: i + 1,
                col: 1,
                message: "Unexpected tab character(s)",
            });
        }
        let trimmed = line.trim_end();
        if trimmed.len() != line.len() {
            found.push(Violation {
                line: i + 1,
                col: trimmed.chars().count() + 1,
                message: "Trailing whitespace",
            });
        }
    }
    if !content.is_empty() && !content.ends_with('\n') {
        found.push(Violation {
            line: content.lines().count(),
            col: 1,
            message: "File must end with a newline",
        });
    }
    found
}

fn format_source(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let body = line.trim_start();
        let indent = line[..line.len() - body.len()].replace('\t', "    ");
        out.push_str(&indent);
        out.push_str(body.trim_end());
        out.push('\n');
    }
    out
}

fn kotlin_files(paths: &[String]) -> io::Result<Vec<PathBuf>> {
    let roots: Vec<PathBuf> = if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths.iter().map(PathBuf::from).collect()
    };

    let mut files = Vec::new();
    for root in roots {
        collect(&root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect(path: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            collect(&entry?.path(), files)?;
        }
    } else if path.extension().is_some_and(|ext| ext == "kt") {
        files.push(path.to_path_buf());
    }
    Ok(())
}

/// Path relative to the working directory when possible
fn display(path: &Path) -> String {
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf());
    relative
        .strip_prefix(".")
        .unwrap_or(&relative)
        .display()
        .to_string()
}
