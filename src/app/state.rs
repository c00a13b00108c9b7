// ==========================================
// 工单 WIP 余料核对 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::WorkOrderApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::engine::{ReturnAndCloseOrchestrator, StockLedger, WorkOrderStatusService};
use crate::repository::{ActionLogRepository, StockLedgerRepository, WorkOrderRepository};

/// 应用状态
///
/// 包含API实例和共享资源；同一个 AppState 内的所有仓储共享一条连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 工单API
    pub work_order_api: Arc<WorkOrderApi>,

    /// 工单仓储（宿主文档层: 建单、发料、耗用）
    pub work_order_repo: Arc<WorkOrderRepository>,

    /// 库存流水仓储
    pub stock_ledger_repo: Arc<StockLedgerRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_stock_ledger(db_path, |repo| repo as Arc<dyn StockLedger>)
    }

    /// 使用自定义库存流水服务创建（测试注入失败的流水服务）
    pub fn with_stock_ledger<F>(db_path: String, make_ledger: F) -> Result<Self, String>
    where
        F: FnOnce(Arc<StockLedgerRepository>) -> Arc<dyn StockLedger>,
    {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let work_order_repo = Arc::new(WorkOrderRepository::new(conn.clone()));
        let stock_ledger_repo = Arc::new(StockLedgerRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let ledger = make_ledger(stock_ledger_repo.clone());
        let orchestrator = Arc::new(ReturnAndCloseOrchestrator::new(
            work_order_repo.clone(),
            ledger,
            config_manager.clone(),
        ));
        let status_service = Arc::new(WorkOrderStatusService::new(
            work_order_repo.clone(),
            config_manager.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let work_order_api = Arc::new(WorkOrderApi::new(
            work_order_repo.clone(),
            orchestrator,
            status_service,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            work_order_api,
            work_order_repo,
            stock_ledger_repo,
            action_log_repo,
            config_manager,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 WIP_RECONCILE_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("WIP_RECONCILE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./wip_reconcile.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("wip-reconcile");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("wip_reconcile.db");
        }
    }

    path.to_string_lossy().to_string()
}
