// ==========================================
// 工单 WIP 余料核对 - 库存流水数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（校验由引擎层的库存流水服务负责）
// 职责:
// - 仓库结存 (bin) 读写
// - 退料单头/明细写入，联动结存与工单明细 returned_qty
// - 退料单查询
// ==========================================

use crate::domain::stock_entry::{ReturnLine, ReturnTransaction};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::work_order_repo::TS_FORMAT;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// StockLedgerRepository - 库存流水仓储
// ==========================================
pub struct StockLedgerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockLedgerRepository {
    /// 创建新的StockLedgerRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 结存
    // ==========================================

    /// 查询仓库结存（无记录视为 0）
    pub fn get_bin_qty(&self, warehouse: &str, item_code: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        bin_qty_on(&conn, warehouse, item_code)
    }

    /// 直接设置仓库结存（期初/盘点）
    pub fn set_bin_qty(&self, warehouse: &str, item_code: &str, qty: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO bin (warehouse, item_code, actual_qty) VALUES (?1, ?2, ?3)
               ON CONFLICT(warehouse, item_code) DO UPDATE SET actual_qty = excluded.actual_qty"#,
            params![warehouse, item_code, qty],
        )?;
        Ok(())
    }

    // ==========================================
    // 退料单查询
    // ==========================================

    /// 按单号查询退料单（含明细）
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<ReturnTransaction>> {
        let conn = self.get_conn()?;
        let header = conn
            .query_row(
                r#"SELECT name, purpose, work_order_id, docstatus, total_qty, posted_at, created_by
                   FROM stock_entry WHERE name = ?1"#,
                params![name],
                map_header,
            )
            .optional()?;

        match header {
            Some(mut entry) => {
                entry.lines = load_lines_on(&conn, &entry.name)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// 查询工单的全部退料单（按过账时间正序）
    pub fn list_by_work_order(&self, work_order_id: &str) -> RepositoryResult<Vec<ReturnTransaction>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT name, purpose, work_order_id, docstatus, total_qty, posted_at, created_by
               FROM stock_entry WHERE work_order_id = ?1
               ORDER BY posted_at ASC, rowid ASC"#,
        )?;
        let mut entries = stmt
            .query_map(params![work_order_id], map_header)?
            .collect::<SqliteResult<Vec<_>>>()?;

        for entry in entries.iter_mut() {
            entry.lines = load_lines_on(&conn, &entry.name)?;
        }
        Ok(entries)
    }

    /// 统计工单的退料单数量
    pub fn count_by_work_order(&self, work_order_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stock_entry WHERE work_order_id = ?1",
            params![work_order_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ==========================================
// 连接级辅助函数（在调用方事务内执行）
// ==========================================

/// 查询仓库结存（无记录视为 0）
pub(crate) fn bin_qty_on(conn: &Connection, warehouse: &str, item_code: &str) -> RepositoryResult<f64> {
    let qty: Option<f64> = conn
        .query_row(
            "SELECT actual_qty FROM bin WHERE warehouse = ?1 AND item_code = ?2",
            params![warehouse, item_code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(qty.unwrap_or(0.0))
}

/// 调整仓库结存
pub(crate) fn adjust_bin_on(
    conn: &Connection,
    warehouse: &str,
    item_code: &str,
    delta: f64,
) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO bin (warehouse, item_code, actual_qty) VALUES (?1, ?2, ?3)
           ON CONFLICT(warehouse, item_code) DO UPDATE SET actual_qty = actual_qty + excluded.actual_qty"#,
        params![warehouse, item_code, delta],
    )?;
    Ok(())
}

/// 工单明细的当前未退余量 (transferred - consumed - returned)
///
/// 行不存在时返回 None
pub(crate) fn unreturned_qty_on(
    conn: &Connection,
    work_order_id: &str,
    item_idx: i32,
) -> RepositoryResult<Option<f64>> {
    let qty = conn
        .query_row(
            r#"SELECT COALESCE(transferred_qty, 0) - COALESCE(consumed_qty, 0) - COALESCE(returned_qty, 0)
               FROM work_order_item WHERE work_order_id = ?1 AND idx = ?2"#,
            params![work_order_id, item_idx],
            |row| row.get::<_, f64>(0),
        )
        .optional()?;
    Ok(qty)
}

/// 写入已校验的退料单
///
/// 同一调用内完成：单头、明细、结存移动 (WIP → 发料仓)、工单明细 returned_qty 累加
pub(crate) fn insert_return_on(conn: &Connection, entry: &ReturnTransaction) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT INTO stock_entry (name, purpose, work_order_id, docstatus, total_qty, posted_at, created_by)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![
            entry.name,
            entry.purpose,
            entry.work_order_id,
            entry.docstatus,
            entry.total_qty,
            entry.posted_at.format(TS_FORMAT).to_string(),
            entry.created_by,
        ],
    )?;

    let mut stmt = conn.prepare(
        r#"INSERT INTO stock_entry_detail
               (name, idx, wo_item_idx, item_code, qty, uom, s_warehouse, t_warehouse)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
    )?;

    for (i, line) in entry.lines.iter().enumerate() {
        stmt.execute(params![
            entry.name,
            (i + 1) as i64,
            line.item_idx,
            line.item_code,
            line.qty,
            line.uom,
            line.from_warehouse,
            line.to_warehouse,
        ])?;

        adjust_bin_on(conn, &line.from_warehouse, &line.item_code, -line.qty)?;
        adjust_bin_on(conn, &line.to_warehouse, &line.item_code, line.qty)?;

        let updated = conn.execute(
            r#"UPDATE work_order_item
               SET returned_qty = COALESCE(returned_qty, 0) + ?1
               WHERE work_order_id = ?2 AND idx = ?3"#,
            params![line.qty, entry.work_order_id, line.item_idx],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkOrderItem".to_string(),
                id: format!("{}#{}", entry.work_order_id, line.item_idx),
            });
        }
    }

    Ok(())
}

fn load_lines_on(conn: &Connection, name: &str) -> RepositoryResult<Vec<ReturnLine>> {
    let mut stmt = conn.prepare(
        r#"SELECT wo_item_idx, item_code, qty, uom, s_warehouse, t_warehouse
           FROM stock_entry_detail WHERE name = ?1 ORDER BY idx"#,
    )?;
    let lines = stmt
        .query_map(params![name], |row| {
            Ok(ReturnLine {
                item_idx: row.get(0)?,
                item_code: row.get(1)?,
                qty: row.get(2)?,
                uom: row.get(3)?,
                from_warehouse: row.get(4)?,
                to_warehouse: row.get(5)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(lines)
}

fn map_header(row: &Row) -> SqliteResult<ReturnTransaction> {
    let posted_at_str: String = row.get(5)?;
    let posted_at = NaiveDateTime::parse_from_str(&posted_at_str, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ReturnTransaction {
        name: row.get(0)?,
        purpose: row.get(1)?,
        work_order_id: row.get(2)?,
        docstatus: row.get(3)?,
        total_qty: row.get(4)?,
        posted_at,
        created_by: row.get(6)?,
        lines: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use crate::domain::stock_entry::{DOCSTATUS_SUBMITTED, PURPOSE_MATERIAL_RETURN};

    fn setup() -> (Arc<Mutex<Connection>>, StockLedgerRepository) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO work_order (work_order_id, production_item, qty, wip_warehouse, status, modified_at)
            VALUES ('WO-1', 'FG', 1, 'WIP', 'SUBMITTED', '2026-01-01 00:00:00');
            INSERT INTO work_order_item (work_order_id, idx, item_code, stock_uom, transferred_qty, consumed_qty)
            VALUES ('WO-1', 1, 'A', 'Kg', 10, 6);
            INSERT INTO bin (warehouse, item_code, actual_qty) VALUES ('WIP', 'A', 4);
            "#,
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), StockLedgerRepository::new(conn))
    }

    fn make_entry() -> ReturnTransaction {
        ReturnTransaction {
            name: "MAT-STE-TEST".to_string(),
            purpose: PURPOSE_MATERIAL_RETURN.to_string(),
            work_order_id: "WO-1".to_string(),
            docstatus: DOCSTATUS_SUBMITTED.to_string(),
            total_qty: 4.0,
            posted_at: chrono::Local::now().naive_local(),
            created_by: "tester".to_string(),
            lines: vec![ReturnLine {
                item_idx: 1,
                item_code: "A".to_string(),
                qty: 4.0,
                uom: "Kg".to_string(),
                from_warehouse: "WIP".to_string(),
                to_warehouse: "Stores".to_string(),
            }],
        }
    }

    #[test]
    fn test_insert_return_moves_stock_and_bumps_returned() {
        let (conn, repo) = setup();
        {
            let c = conn.lock().unwrap();
            assert_eq!(unreturned_qty_on(&c, "WO-1", 1).unwrap(), Some(4.0));
            insert_return_on(&c, &make_entry()).unwrap();
            assert_eq!(unreturned_qty_on(&c, "WO-1", 1).unwrap(), Some(0.0));
            assert_eq!(unreturned_qty_on(&c, "WO-1", 9).unwrap(), None);
        }

        assert_eq!(repo.get_bin_qty("WIP", "A").unwrap(), 0.0);
        assert_eq!(repo.get_bin_qty("Stores", "A").unwrap(), 4.0);
        assert_eq!(repo.count_by_work_order("WO-1").unwrap(), 1);

        let found = repo.find_by_name("MAT-STE-TEST").unwrap().unwrap();
        assert_eq!(found.lines.len(), 1);
        assert_eq!(found.lines[0].uom, "Kg");
        assert_eq!(repo.list_by_work_order("WO-1").unwrap().len(), 1);
    }

    #[test]
    fn test_insert_return_unknown_row_fails() {
        let (conn, _repo) = setup();
        let mut entry = make_entry();
        entry.lines[0].item_idx = 7;
        let c = conn.lock().unwrap();
        let result = insert_return_on(&c, &entry);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[test]
    fn test_set_bin_qty_overwrites() {
        let (_conn, repo) = setup();
        repo.set_bin_qty("WIP", "A", 1.5).unwrap();
        assert_eq!(repo.get_bin_qty("WIP", "A").unwrap(), 1.5);
        assert_eq!(repo.get_bin_qty("WIP", "Z").unwrap(), 0.0);
    }
}
