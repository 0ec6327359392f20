use anyhow::Result;
use colored::*;
use figlet_rs::FIGfont;
use std::io::{stdin, stdout, Write};

pub fn show_welcome_screen_start() -> Result<()> {
    let font = FIGfont::standard().map_err(|e| anyhow::anyhow!(e))?;
    let Some(figure) = font.convert("crystal") else {
        anyhow::bail!("Couldn't convert the font into figure!");
    };

    print!("\x1B[2J\x1B[1;1H");
    println!("{}", figure.to_string().bright_cyan().bold());
    println!("{}", "Hot keys, spread over a tree of shards".italic().dimmed());
    println!("{}", "\nPress Enter to start...".yellow().bold());

    let mut input = String::new();
    let _ = stdout().flush();
    stdin().read_line(&mut input)?;
    Ok(())
}

pub fn show_prompt() {
    print!("{}", ":: ".bright_green().bold());
    let _ = stdout().flush();
}

pub fn show_help() {
    println!("{}", "Commands:".bold());
    println!("  GET <address> <key>");
    println!("  PUT <address> <key> <value>");
    println!("  INCR <address> <key>");
    println!("  MERGE <address> <json>");
    println!("  DUMP <address>");
    println!("  EXIT");
}

//json replies are pretty printed, plain text replies as they are
pub fn show_reply(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) => {
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string());
            println!("{}", pretty.cyan());
        }
        _ => println!("{}", format!(":: {}", body).cyan()),
    }
}

pub fn show_failure(status: u16, body: &str) {
    println!("{}", format!("✗ {} {}", status, body).red());
}
