mod ask;
mod serve;

use anyhow::{Result, bail};
use console::style;

use crate::core::terminal::{self, GuideSection};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("serve", "Start the research API and cleanup scheduler")
        .command("  --api-host <HOST>", "Bind address (default 127.0.0.1)")
        .command("  --api-port <PORT>", "Bind port (default 17890)")
        .print();

    GuideSection::new("One-shot")
        .command("ask --prompt <TEXT>", "Stream an answer to stdout")
        .command("  --model <MODEL>", "Override the configured model")
        .command("  --tool <NAME>", "Enable web_search or code_interpreter")
        .print();

    GuideSection::new("Environment")
        .command("RESEARCH_RELAY_DATA_DIR", "Directory holding config.toml")
        .command("RESEARCH_RELAY_UPSTREAM_URL", "Upstream API base URL")
        .command("OPENAI_API_KEY", "Upstream API key")
        .command("RUST_LOG", "Log filter (default info)")
        .print();

    println!(
        "\n {} {} <command> [flags]\n",
        style("Usage:").bold(),
        style("research-relay").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AskArgs {
    pub prompt: String,
    pub model: Option<String>,
    pub tools: Vec<String>,
}

pub(crate) fn parse_ask_args(args: &[String], start: usize) -> AskArgs {
    let mut prompt = String::new();
    let mut model = None;
    let mut tools = Vec::new();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--prompt" | "-p" => {
                if i + 1 < args.len() {
                    prompt = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--model" | "-m" => {
                if i + 1 < args.len() {
                    model = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--tool" | "-t" => {
                if i + 1 < args.len() {
                    tools.push(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    AskArgs {
        prompt,
        model,
        tools,
    }
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(api_port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("serve") => serve::run(&args).await,
        Some("ask") => ask::run(parse_ask_args(&args, 2)).await,
        Some("help") | Some("--help") | Some("-h") | None => {
            print_help();
            Ok(())
        }
        Some(other) => {
            print_help();
            bail!("Unknown command '{}'", other)
        }
    }
}
