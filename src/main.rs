// ModemCom - Hayes AT modem emulator
use anyhow::Context;
use clap::Parser;
use modemcom::cli::{execute_command, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let command = args.command.name();

    execute_command(args)
        .await
        .with_context(|| format!("modemcom {} failed", command))
}
