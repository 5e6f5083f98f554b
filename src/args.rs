use std::path::PathBuf;

use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct BaseArgs {
    /// Output as JSON
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    /// Override engine URL (or via GLA_ENGINE_URL)
    #[arg(
        long,
        env = "GLA_ENGINE_URL",
        hide_env_values = true,
        global = true
    )]
    pub engine_url: Option<String>,

    /// Override engine bearer token (or via GLA_ENGINE_TOKEN)
    #[arg(
        long,
        env = "GLA_ENGINE_TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub engine_token: Option<String>,

    /// Path to a .env file to load before running commands.
    #[arg(long, env = "GLA_ENV_FILE", hide_env_values = true)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CLIArgs<T: Args> {
    #[command(flatten)]
    pub base: BaseArgs,

    #[command(flatten)]
    pub args: T,
}
