mod commands;
mod config;
mod context;
mod interactive;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use otp_flow::FlowKind;

use crate::config::Config;
use crate::context::Context;
use crate::interactive::{run_flow, FlowEnd};

#[derive(Parser)]
#[command(name = "maherkar-otp", about = "Sign in or register on MaherKar with a one-time code")]
struct Cli {
    /// Auth API base URL (overrides MAHERKAR_AUTH_URL)
    #[arg(long, global = true)]
    auth_url: Option<String>,

    /// Key-value store file (overrides OTP_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Resend window in seconds (overrides OTP_WINDOW_SECONDS)
    #[arg(long, global = true)]
    window_seconds: Option<u64>,

    /// Print the code echoed by the backend (overrides OTP_SHOW_DEBUG_CODE)
    #[arg(long, global = true)]
    show_debug_code: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with a one-time code
    Login {
        #[arg(long)]
        phone: Option<String>,
    },
    /// Create an account with a one-time code
    Register {
        #[arg(long)]
        phone: Option<String>,
    },
    /// Show pending code sessions for a phone number
    Status {
        #[arg(long)]
        phone: String,
    },
    /// Discard pending code sessions for a phone number
    Forget {
        #[arg(long)]
        phone: String,
    },
    /// Show the stored credentials
    Whoami,
    /// Remove the stored credentials
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,otp_flow=info,maherkar_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(auth_url) = cli.auth_url {
        config.auth_url = auth_url;
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(window_seconds) = cli.window_seconds {
        config.set_window_seconds(window_seconds)?;
    }
    if cli.show_debug_code {
        config.show_debug_code = true;
    }

    let ctx = Context::new(config)?;

    match cli.command {
        Command::Login { phone } => sign_in(&ctx, FlowKind::Login, phone).await,
        Command::Register { phone } => sign_in(&ctx, FlowKind::Register, phone).await,
        Command::Status { phone } => commands::status(&ctx, &phone),
        Command::Forget { phone } => commands::forget(&ctx, &phone),
        Command::Whoami => commands::whoami(&ctx),
        Command::Logout => commands::logout(&ctx),
    }
}

/// Run a form; an unregistered login continues in registration.
async fn sign_in(ctx: &Context, kind: FlowKind, phone: Option<String>) -> Result<()> {
    let mut kind = kind;
    let mut phone = phone;
    loop {
        match run_flow(ctx, kind, phone.take()).await? {
            FlowEnd::Completed(result) => {
                commands::print_signed_in(&result);
                return Ok(());
            }
            FlowEnd::Redirect(unregistered) => {
                println!(
                    "{}",
                    "No account uses this number yet. Let's create one.".bright_blue()
                );
                kind = FlowKind::Register;
                phone = Some(unregistered.to_string());
            }
            FlowEnd::Cancelled => {
                println!("{}", "👋 Goodbye!".bright_blue());
                return Ok(());
            }
        }
    }
}
