use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::scanner::Scanner;
use rox::token::Token;
use rox::{Lox, RunError, EXIT_STATIC_ERROR};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a Lox program from a file, or an interactive prompt without one
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print every diagnostic and exit with the matching status.
fn fail(error: RunError) -> ! {
    debug!("Run failed: {:?}", error);

    for e in error.errors() {
        eprintln!("{}", e);
    }

    process::exit(error.exit_code());
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for result in Scanner::new(source) {
        match result {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?
        );
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC_ERROR);
        process::exit(EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn run_prompt() -> Result<()> {
    info!("Starting interactive prompt");

    let mut lox = Lox::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        // Errors are reported and the session continues.
        if let Err(error) = lox.run(&line) {
            for e in error.errors() {
                eprintln!("{}", e);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            let source = read_file(&filename)?;
            tokenize(&source, json)?;
        }

        Commands::Parse { filename } => {
            let source = read_file(&filename)?;

            match rox::parse_expression(&source) {
                Ok(expr) => println!("{}", AstPrinter.print(&expr)),
                Err(errors) => fail(RunError::Static(errors)),
            }
        }

        Commands::Evaluate { filename } => {
            let source = read_file(&filename)?;
            let mut lox = Lox::new();

            match lox.evaluate(&source) {
                Ok(value) => println!("{}", value),
                Err(error) => fail(error),
            }
        }

        Commands::Run { filename } => match filename {
            Some(filename) => {
                let source = read_file(&filename)?;
                let mut lox = Lox::new();

                if let Err(error) = lox.run(&source) {
                    fail(error);
                }

                info!("Program executed successfully");
            }

            None => run_prompt()?,
        },
    }

    Ok(())
}
