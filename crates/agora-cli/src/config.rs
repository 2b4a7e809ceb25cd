use clap::{Parser, Subcommand};

use crate::commands::{create_user::CreateUserCmd, query::QueryCmd};

#[derive(Parser)]
#[command(
    version,
    about,
    long_about = "CLI for agora - manages users and runs sample queries directly against the database."
)]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    CreateUser(CreateUserCmd),
    Query(QueryCmd),
}

impl crate::commands::Executor for Command {
    async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::CreateUser(cmd) => cmd.run().await,
            Command::Query(cmd) => cmd.run().await,
        }
    }
}
