use std::net::TcpListener;

use crate::cmd::async_runtime;
use crate::config;
use crate::startup;

#[derive(clap::Args, Debug)]
pub struct Args {}

/// Runs the boardline server.
pub fn run(_args: Args) -> anyhow::Result<()> {
    let runtime = async_runtime()?;
    let listener = TcpListener::bind(config::settings().application.address())?;

    runtime.block_on(async move { serve(listener).await })
}

async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    let db = startup::connect_to_database(&config::settings().database).await?;
    let server = startup::run(listener, db)?;

    server.await?;

    Ok(())
}
