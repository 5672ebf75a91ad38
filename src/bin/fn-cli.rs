use clap::{Parser, Subcommand};
use fn_runtime::envelope::{Envelope, ResponseEnvelope};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fn-cli")]
#[command(about = "Operator CLI for a running function", long_about = None)]
struct Cli {
    #[arg(short, long, global = true, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request envelope to the function
    Invoke {
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(short, long, default_value = "/")]
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// JSON caller context
        #[arg(long)]
        context: Option<String>,
        /// Header as `Key:Value`, repeatable
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Query parameter as `key=value`, repeatable
        #[arg(long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,
        #[arg(long)]
        trace_id: Option<String>,
    },
    /// Check the function's healthz endpoint
    Healthz,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected Key:Value, got {s:?}"))
}

fn parse_query(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

fn parse_json(flag: &str, raw: Option<String>) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).map_err(|e| format!("invalid JSON for --{flag}: {e}"))?;
    Ok(Some(value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let envelope = match cli.command {
        Commands::Invoke {
            method,
            path,
            body,
            context,
            headers,
            query,
            trace_id,
        } => {
            let mut env = Envelope::new(method.to_uppercase(), path);
            env.body = parse_json("body", body)?;
            env.context = parse_json("context", context)?;
            env.trace_id = trace_id.unwrap_or_default();
            for (k, v) in headers {
                env.params.header.entry(k).or_default().push(v);
            }
            for (k, v) in query {
                env.params.query.entry(k).or_default().push(v);
            }
            env
        }
        Commands::Healthz => Envelope::new("GET", "/healthz"),
    };

    let res = client.post(&cli.url).json(&envelope).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<ResponseEnvelope>(&text) {
        Ok(envelope) => {
            if !status.is_success() {
                eprintln!("Error: function returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Err(_) => {
            eprintln!("Error: unexpected response (status {})", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
