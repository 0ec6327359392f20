mod cli;
mod display;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use crystal_types::ShardLayout;
use rand::Rng;
use reqwest::{Method, StatusCode};
use std::io::stdin;

//one request of the shard surface per call
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(addr: &str) -> Self {
        let base_url = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", addr.trim_end_matches('/'))
        };
        NodeClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, address: &str, key: Option<&str>) -> String {
        match key {
            Some(key) => format!("{}/{}/{}", self.base_url, address, key),
            None => format!("{}/{}", self.base_url, address),
        }
    }

    async fn send(&self, method: Method, url: String, body: Option<String>) -> Result<()> {
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.body(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("couldn't reach {}", url))?;

        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::OK {
            display::show_reply(&body);
        } else {
            display::show_failure(status.as_u16(), &body);
        }
        Ok(())
    }

    pub async fn get(&self, address: &str, key: &str) -> Result<()> {
        self.send(Method::GET, self.url(address, Some(key)), None).await
    }

    pub async fn put(&self, address: &str, key: &str, value: Option<String>) -> Result<()> {
        self.send(Method::PUT, self.url(address, Some(key)), value).await
    }

    pub async fn merge(&self, address: &str, json: &str) -> Result<()> {
        //checked here so a typo never reaches the node
        serde_json::from_str::<serde_json::Value>(json).context("merge body is not valid json")?;
        self.send(Method::PATCH, self.url(address, None), Some(json.to_string()))
            .await
    }

    pub async fn dump(&self, address: &str) -> Result<()> {
        let url = format!("{}?dump=true", self.url(address, None));
        self.send(Method::GET, url, None).await
    }
}

fn pick_leaf(layout: ShardLayout, base: &str, spread: Option<String>) -> Result<String> {
    let token = spread.unwrap_or_else(|| rand::rng().random::<u64>().to_string());
    let leaf = layout
        .leaf_for(base, &token)
        .with_context(|| format!("{} is not a valid base address", base))?;
    Ok(leaf.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let addr = cli.addr.unwrap_or_else(|| "127.0.0.1:8787".to_string());
    let client = NodeClient::new(&addr);

    match cli.command {
        Some(Commands::Interactive) | None => {
            display::show_welcome_screen_start()?;
            run_interactive(client).await?;
        }

        Some(Commands::Get { address, key }) => client.get(&address, &key).await?,

        Some(Commands::Put {
            address,
            key,
            value,
        }) => client.put(&address, &key, Some(value)).await?,

        Some(Commands::Incr { address, key }) => client.put(&address, &key, None).await?,

        Some(Commands::Merge { address, json }) => client.merge(&address, &json).await?,

        Some(Commands::Dump { address }) => client.dump(&address).await?,

        Some(Commands::Write {
            base,
            key,
            value,
            spread,
            shard_count,
            shard_ratio,
        }) => {
            let leaf = pick_leaf(ShardLayout::new(shard_count, shard_ratio), &base, spread)?;
            println!("{}", format!("-> {}", leaf).dimmed());
            client.put(&leaf, &key, value).await?;
        }
    }

    Ok(())
}

async fn run_interactive(client: NodeClient) -> Result<()> {
    loop {
        display::show_prompt();

        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        let outcome = match parts[0].to_uppercase().as_str() {
            "HELP" => {
                display::show_help();
                Ok(())
            }

            "EXIT" | "QUIT" => {
                println!("{}", "Goodbye!".blue().bold());
                break;
            }

            "GET" if parts.len() == 3 => client.get(parts[1], parts[2]).await,

            "PUT" if parts.len() >= 4 => {
                client
                    .put(parts[1], parts[2], Some(parts[3..].join(" ")))
                    .await
            }

            "INCR" if parts.len() == 3 => client.put(parts[1], parts[2], None).await,

            "MERGE" if parts.len() >= 3 => client.merge(parts[1], &parts[2..].join(" ")).await,

            "DUMP" if parts.len() == 2 => client.dump(parts[1]).await,

            _ => {
                println!("{}", "Invalid command. Type HELP.".red());
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("{}", format!("✗ {:#}", e).red());
        }
    }

    Ok(())
}
