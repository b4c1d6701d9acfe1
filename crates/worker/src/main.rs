use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campus_observability::init();

    let config = campus_core::AppConfig::load().context("configuration is invalid")?;

    campus_worker::run(config).await
}
