// ==========================================
// 工单 WIP 余料核对 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout：并发退料关闭时第二个写者等待而不是立即报 busy
// - 建表幂等，启动/测试共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并写入 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS work_order (
            work_order_id TEXT PRIMARY KEY,
            production_item TEXT NOT NULL,
            qty REAL NOT NULL DEFAULT 0,
            wip_warehouse TEXT NOT NULL,
            source_warehouse TEXT,
            status TEXT NOT NULL CHECK(status IN (
                'DRAFT', 'SUBMITTED', 'IN_PROCESS', 'COMPLETED',
                'STOPPED', 'CLOSED', 'CANCELLED'
            )),
            modified_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_order_item (
            work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id) ON DELETE CASCADE,
            idx INTEGER NOT NULL,
            item_code TEXT NOT NULL,
            source_warehouse TEXT,
            stock_uom TEXT NOT NULL,
            transferred_qty REAL,
            consumed_qty REAL,
            returned_qty REAL,
            PRIMARY KEY (work_order_id, idx)
        );

        CREATE TABLE IF NOT EXISTS bin (
            warehouse TEXT NOT NULL,
            item_code TEXT NOT NULL,
            actual_qty REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (warehouse, item_code)
        );

        CREATE TABLE IF NOT EXISTS stock_entry (
            name TEXT PRIMARY KEY,
            purpose TEXT NOT NULL,
            work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id),
            docstatus TEXT NOT NULL,
            total_qty REAL NOT NULL,
            posted_at TEXT NOT NULL,
            created_by TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stock_entry_detail (
            name TEXT NOT NULL REFERENCES stock_entry(name),
            idx INTEGER NOT NULL,
            wo_item_idx INTEGER NOT NULL,
            item_code TEXT NOT NULL,
            qty REAL NOT NULL CHECK(qty > 0),
            uom TEXT NOT NULL,
            s_warehouse TEXT NOT NULL,
            t_warehouse TEXT NOT NULL,
            PRIMARY KEY (name, idx)
        );

        -- 已提交的退料单为不可变流水
        CREATE TRIGGER IF NOT EXISTS trg_stock_entry_no_update
        BEFORE UPDATE ON stock_entry
        BEGIN SELECT RAISE(ABORT, 'stock_entry is immutable'); END;

        CREATE TRIGGER IF NOT EXISTS trg_stock_entry_no_delete
        BEFORE DELETE ON stock_entry
        BEGIN SELECT RAISE(ABORT, 'stock_entry is immutable'); END;

        CREATE TRIGGER IF NOT EXISTS trg_stock_entry_detail_no_update
        BEFORE UPDATE ON stock_entry_detail
        BEGIN SELECT RAISE(ABORT, 'stock_entry_detail is immutable'); END;

        CREATE TRIGGER IF NOT EXISTS trg_stock_entry_detail_no_delete
        BEFORE DELETE ON stock_entry_detail
        BEGIN SELECT RAISE(ABORT, 'stock_entry_detail is immutable'); END;

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            work_order_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_stock_entry_work_order ON stock_entry(work_order_id);
        CREATE INDEX IF NOT EXISTS idx_action_log_work_order ON action_log(work_order_id, action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
