//! SiteRouter CLI
//!
//! Drives a real gateway from the terminal: log in, inspect and edit
//! per-host rule blocks, validate rule text, and poke the proxy core.

use std::fs;

use clap::{Args, Parser, Subcommand};

use sr_core::rules;
use sr_core::session::DEFAULT_SERVER;
use sr_gateway::GatewayClient;

#[derive(Parser)]
#[command(name = "sr-cli")]
#[command(about = "SiteRouter gateway rules and status tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Connection {
    /// Gateway address
    #[arg(short, long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Bearer token from a previous login
    #[arg(short, long)]
    token: Option<String>,
}

impl Connection {
    fn client(&self) -> GatewayClient {
        let client = GatewayClient::new(&self.server);
        match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the bearer token
    Login {
        #[command(flatten)]
        conn: Connection,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Routing document operations
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },

    /// Show proxy core status
    Status {
        #[command(flatten)]
        conn: Connection,
    },

    /// Ask the gateway to (re)start the proxy core
    Reload {
        #[command(flatten)]
        conn: Connection,
    },

    /// Ask the gateway to stop the proxy core
    Stop {
        #[command(flatten)]
        conn: Connection,
    },
}

#[derive(Subcommand)]
enum RulesCommands {
    /// Print the full routing document
    Get {
        #[command(flatten)]
        conn: Connection,
    },

    /// Print one host's merged rule view
    View {
        #[command(flatten)]
        conn: Connection,

        /// Host whose rules to show
        #[arg(long)]
        host: String,
    },

    /// Replace one host's rules with the contents of a file
    Save {
        #[command(flatten)]
        conn: Connection,

        #[arg(long)]
        host: String,

        /// File with the edited rule lines
        #[arg(short, long)]
        file: String,
    },

    /// Add the standard proxy rule for a host
    Add {
        #[command(flatten)]
        conn: Connection,

        #[arg(long)]
        host: String,
    },

    /// Remove the standard proxy rule for a host
    Remove {
        #[command(flatten)]
        conn: Connection,

        #[arg(long)]
        host: String,
    },

    /// Validate rule text locally, without touching the gateway
    Validate {
        /// File with rule text to check
        #[arg(short, long)]
        file: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Login { conn, username, password } => {
            runtime.block_on(cmd_login(&conn, &username, &password))
        }
        Commands::Rules { command } => match command {
            RulesCommands::Get { conn } => runtime.block_on(cmd_get(&conn)),
            RulesCommands::View { conn, host } => runtime.block_on(cmd_view(&conn, &host)),
            RulesCommands::Save { conn, host, file } => {
                runtime.block_on(cmd_save(&conn, &host, &file))
            }
            RulesCommands::Add { conn, host } => runtime.block_on(cmd_add(&conn, &host)),
            RulesCommands::Remove { conn, host } => runtime.block_on(cmd_remove(&conn, &host)),
            RulesCommands::Validate { file } => cmd_validate(&file),
        },
        Commands::Status { conn } => runtime.block_on(cmd_status(&conn)),
        Commands::Reload { conn } => runtime.block_on(cmd_reload(&conn)),
        Commands::Stop { conn } => runtime.block_on(cmd_stop(&conn)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn cmd_login(conn: &Connection, username: &str, password: &str) -> Result<(), String> {
    let mut client = conn.client();
    let token = client
        .login(username, password)
        .await
        .map_err(|e| format!("login failed: {e}"))?;

    println!("Login ok");
    println!("  Token: {token}");
    println!("  Pass it to other commands via --token");
    Ok(())
}

async fn cmd_get(conn: &Connection) -> Result<(), String> {
    let text = fetch_routing(conn).await?;
    println!("{text}");
    Ok(())
}

async fn cmd_view(conn: &Connection, host: &str) -> Result<(), String> {
    let text = fetch_routing(conn).await?;
    let view = rules::load_host_view(&text, host);

    if view.lines.is_empty() {
        println!("No rules found for {host}");
        return Ok(());
    }

    println!(
        "Rules for {host} ({}managed block):",
        if view.block_found { "" } else { "no " }
    );
    for line in &view.lines {
        println!("  {line}");
    }
    Ok(())
}

async fn cmd_save(conn: &Connection, host: &str, file: &str) -> Result<(), String> {
    let edited_text =
        fs::read_to_string(file).map_err(|e| format!("failed to read '{file}': {e}"))?;

    let edited = rules::normalize_block(&edited_text);
    let report = rules::validate(&edited.join("\n"));
    if !report.is_ok() {
        return Err(format!("validation failed: {}", report.summary()));
    }

    let client = conn.client();
    let text = client
        .fetch_routing()
        .await
        .map_err(|e| format!("cannot get rules: {e}"))?;

    let new_text = rules::compute_save_text(&text, host, &edited);
    client
        .apply_routing(&new_text)
        .await
        .map_err(|e| format!("update failed: {e}"))?;

    if edited.is_empty() {
        println!("Removed all rules for {host}");
    } else {
        println!("Saved {} rule(s) for {host}", edited.len());
    }
    Ok(())
}

async fn cmd_add(conn: &Connection, host: &str) -> Result<(), String> {
    let client = conn.client();
    let text = client
        .fetch_routing()
        .await
        .map_err(|e| format!("cannot get rules: {e}"))?;

    let new_text = match rules::append_rule(&text, host) {
        Ok(new_text) => new_text,
        Err(e) => return Err(format!("add failed: {e}")),
    };

    client
        .apply_routing(&new_text)
        .await
        .map_err(|e| format!("update failed: {e}"))?;

    println!("Added {}", rules::proxy_rule(host));
    Ok(())
}

async fn cmd_remove(conn: &Connection, host: &str) -> Result<(), String> {
    let client = conn.client();
    let text = client
        .fetch_routing()
        .await
        .map_err(|e| format!("cannot get rules: {e}"))?;

    let new_text = rules::remove_rule(&text, host);
    if new_text == text {
        println!("No rule to remove for {host}");
        return Ok(());
    }

    client
        .apply_routing(&new_text)
        .await
        .map_err(|e| format!("update failed: {e}"))?;

    println!("Removed {}", rules::proxy_rule(host));
    Ok(())
}

fn cmd_validate(file: &str) -> Result<(), String> {
    let text = fs::read_to_string(file).map_err(|e| format!("failed to read '{file}': {e}"))?;

    let report = rules::validate(&text);
    if report.is_ok() {
        println!("{file} is valid");
        return Ok(());
    }

    println!("{file} has {} problem(s):", report.issues.len());
    for issue in &report.issues {
        println!("  {issue}");
    }
    Err("validation failed".to_string())
}

async fn cmd_status(conn: &Connection) -> Result<(), String> {
    let status = conn
        .client()
        .touch()
        .await
        .map_err(|e| format!("cannot get status: {e}"))?;

    println!("Proxy: {}", status.state());
    println!("  Running:    {}", status.running);
    println!("  Connected:  {} server(s)", status.connected_servers);
    Ok(())
}

async fn cmd_reload(conn: &Connection) -> Result<(), String> {
    conn.client()
        .reload_core()
        .await
        .map_err(|e| format!("reload failed: {e}"))?;
    println!("Proxy core reloading");
    Ok(())
}

async fn cmd_stop(conn: &Connection) -> Result<(), String> {
    conn.client()
        .stop_core()
        .await
        .map_err(|e| format!("stop failed: {e}"))?;
    println!("Proxy core stopped");
    Ok(())
}

async fn fetch_routing(conn: &Connection) -> Result<String, String> {
    conn.client()
        .fetch_routing()
        .await
        .map_err(|e| format!("cannot get rules: {e}"))
}
