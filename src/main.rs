use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    rpc_cli::cli_main::main().await
}
