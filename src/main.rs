use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    htp_client::cli::run_cli().await
}
