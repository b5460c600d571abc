use std::fs;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};

use cobra::interpreter::Interpreter;
use cobra::{compile, optimizer};

fn main() -> Result<()> {
    let mut safe_mode = false;
    let mut optimize = true;
    let mut input_path: Option<String> = None;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--safe" | "-s" => safe_mode = true,
            "--no-optimize" => optimize = false,
            _ => {
                if input_path.is_some() {
                    bail!("Only one input file is supported");
                }
                input_path = Some(arg);
            }
        }
    }

    let source = if let Some(path) = input_path {
        fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let statements = match compile(&source) {
        Ok(statements) => statements,
        Err(error) => bail!("{error}"),
    };
    let statements = if optimize {
        optimizer::optimize(statements)
    } else {
        statements
    };

    let mut interpreter = Interpreter::new(safe_mode);
    if let Err(error) = interpreter.run(&statements) {
        bail!("{error}");
    }
    let output = interpreter.take_output();
    if !output.is_empty() {
        println!("{}", output.join("\n"));
    }
    Ok(())
}
