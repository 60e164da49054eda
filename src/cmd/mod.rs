pub mod serve;

#[derive(clap::Parser, Debug)]
#[clap(name = "boardline")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Runs the HTTP server.
    Serve(serve::Args),
}

pub fn async_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}
