//! # coedit CLI
//!
//! Command-line utilities for replaying, transforming, and inspecting
//! documents and operations offline.

use anyhow::{Context, Result};
use coedit_core::{apply_all, transform_pair, Document, Operation};
use std::env;
use std::fs;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "apply" => {
            if args.len() < 4 {
                eprintln!("Usage: coedit apply <doc.json> <ops.json>");
                std::process::exit(1);
            }
            let doc = read_document(&args[2])?;
            let ops = read_operations(&args[3])?;
            let result = apply_all(&doc, &ops);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "transform" => {
            if args.len() < 4 {
                eprintln!("Usage: coedit transform <a.json> <b.json>");
                std::process::exit(1);
            }
            let a = read_operation(&args[2])?;
            let b = read_operation(&args[3])?;
            let (a2, b2) = transform_pair(&a, &b);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "a_prime": a2,
                    "b_prime": b2,
                }))?
            );
        }
        "text" => {
            if args.len() < 3 {
                eprintln!("Usage: coedit text <doc.json>");
                std::process::exit(1);
            }
            let doc = read_document(&args[2])?;
            for block in &doc.blocks {
                println!("{}", block.text());
            }
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn read_document(path: &str) -> Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse document {path}"))
}

fn read_operations(path: &str) -> Result<Vec<Operation>> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse operations {path}"))
}

fn read_operation(path: &str) -> Result<Operation> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse operation {path}"))
}

fn print_help() {
    println!(
        r#"coedit CLI

USAGE:
    coedit <COMMAND> [OPTIONS]

COMMANDS:
    apply <doc.json> <ops.json>   Fold a list of operations over a document
    transform <a.json> <b.json>   Transform a concurrent operation pair
    text <doc.json>               Print a document's plain text, one block per line
    help                          Show this help message

EXAMPLES:
    coedit apply snapshot.json history.json
    coedit transform local_op.json remote_op.json
"#
    );
}
