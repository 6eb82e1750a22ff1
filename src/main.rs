use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use gemsearch::gemini::GeminiClientTrait;
use gemsearch::{GeminiClientBuilder, GenerateContentResponse, config};
use tracing_subscriber::EnvFilter;

/// gemsearch - ask Gemini questions grounded with Google Search
#[derive(Parser)]
#[command(name = "gemsearch")]
#[command(about = "Ask Gemini questions grounded with Google Search, with inline citations")]
#[command(version)]
struct Cli {
    /// Question to ask. Omit to start an interactive session.
    #[arg(value_name = "QUESTION")]
    question: Option<String>,

    /// Model to use (falls back to GEMINI_MODEL, then the default)
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// API key (falls back to GEMINI_API_KEY, also read from .env)
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// List models known to support search grounding and exit
    #[arg(long)]
    list_models: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("{} {e:#}", "Error:".red());
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are configuration mistakes like a missing API key.
/// Internal errors include network and API failures.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.to_string().contains(config::MISSING_API_KEY_MSG)
}

fn run(cli: &Cli) -> Result<()> {
    if cli.list_models {
        for model in config::KNOWN_MODELS {
            let marker = if *model == config::DEFAULT_MODEL {
                " (default)"
            } else {
                ""
            };
            println!("{model}{marker}");
        }
        return Ok(());
    }

    config::load_dotenv()?;
    let api_key = config::resolve_api_key(cli.api_key.as_deref())?;
    let model = config::resolve_model(cli.model.as_deref());

    let client = GeminiClientBuilder::new()
        .api_key(api_key)
        .model(&model)
        .build()
        .context("Failed to create Gemini client")?;

    match &cli.question {
        Some(question) => ask(&client, &model, question),
        None => interactive_loop(&client, &model),
    }
}

/// Reads questions from stdin until `exit`, `quit`, or EOF.
fn interactive_loop(client: &dyn GeminiClientTrait, model: &str) -> Result<()> {
    println!(
        "{}",
        "Ready. Type a question and press Enter; \"exit\" or \"quit\" to leave.".green()
    );

    let stdin = io::stdin();
    loop {
        print!("{} ", "?".blue().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            // EOF
            println!();
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            println!("{}", "Goodbye!".green());
            break;
        }

        ask(client, model, question)?;
    }

    Ok(())
}

/// Sends one question and prints the rendered answer.
fn ask(client: &dyn GeminiClientTrait, model: &str, question: &str) -> Result<()> {
    println!("\n{} \"{question}\"", "Question:".cyan());
    println!("{} {model}", "Model:".blue());
    println!("{}", "Searching and generating response...".yellow());

    let response = client
        .generate_grounded(question)
        .context("Request to Gemini failed")?;

    print!("{}", render_answer(&response));
    Ok(())
}

/// Renders the answer sections: raw text, annotated text, and the query and
/// source listings when grounding metadata is present.
fn render_answer(response: &GenerateContentResponse) -> String {
    let mut out = String::new();

    out.push_str("\nRESPONSE:\n==================\n");
    out.push_str(&response.text());
    out.push_str("\n==================\n");

    if response.grounding_metadata().is_some() {
        out.push_str("\nWITH CITATIONS:\n========================\n");
        out.push_str(&gemsearch::annotate(response));
        out.push('\n');
        out.push_str(&gemsearch::format_search_queries(response));
        out.push_str(&gemsearch::format_sources(response));
    } else {
        out.push_str("\nThis response is not grounded with Google Search.\n");
    }

    out
}
