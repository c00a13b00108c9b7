// ==========================================
// 工单 WIP 余料核对 - 命令行入口
// ==========================================
// 行协议: stdin 每行一个 {"method", "args"} 请求，stdout 每行一个响应
// ==========================================

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wip_reconcile::app::{get_default_db_path, handle_line, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    wip_reconcile::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", wip_reconcile::APP_NAME);
    tracing::info!("系统版本: {}", wip_reconcile::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&state, line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("输入结束，退出");
    Ok(())
}
