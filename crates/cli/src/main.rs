use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    autocomplete_cli::main_entry().await
}
