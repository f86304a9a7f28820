use anyhow::Result;
use pdf_quiz::utils::logging;
use pdf_quiz::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load(None)?;

    // 初始化日志
    logging::init(&config)?;

    // 初始化并运行应用
    let mut app = App::initialize(config).await?;
    app.run().await?;

    Ok(())
}
