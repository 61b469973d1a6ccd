use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "tally-cli")]
#[command(about = "CLI client for a tally ledger node")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending pool
    Submit {
        /// Node base URL (e.g. http://127.0.0.1:8080)
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Sender
        #[arg(long)]
        sender: String,
        /// Recipient
        #[arg(long)]
        recipient: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Ask the node to mine the next block
    Mine {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Print the node's full chain
    Chain {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
    /// Register peer nodes (full URLs or host:port)
    Register {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
        /// Peers to register
        peers: Vec<String>,
    },
    /// Trigger longest-chain consensus resolution
    Resolve {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        node: String,
    },
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
struct Register {
    nodes: Vec<String>,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    match cli.cmd {
        Command::Submit {
            node,
            sender,
            recipient,
            amount,
        } => {
            let tx = Tx {
                sender,
                recipient,
                amount,
            };
            let res = client
                .post(format!("{node}/transactions/new"))
                .json(&tx)
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Mine { node } => {
            let res = client.get(format!("{node}/mine")).send().await?;
            print_response(res).await?;
        }
        Command::Chain { node } => {
            let res = client.get(format!("{node}/chain")).send().await?;
            print_response(res).await?;
        }
        Command::Register { node, peers } => {
            let body = Register { nodes: peers };
            let res = client
                .post(format!("{node}/nodes/register"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Command::Resolve { node } => {
            let res = client.get(format!("{node}/nodes/resolve")).send().await?;
            print_response(res).await?;
        }
    }
    Ok(())
}
