// ==========================================
// 工单 WIP 余料核对 - 工单数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责:
// - 工单/明细读写（宿主平台的文档层）
// - 开启加锁的工作单元 (BEGIN IMMEDIATE)
// - 模拟宿主的发料/耗用事件（本系统核心从不调用）
// ==========================================

mod unit;

pub use unit::WorkOrderUnit;

use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{WorkOrder, WorkOrderItem};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::stock_ledger_repo::adjust_bin_on;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// WorkOrderRepository - 工单仓储
// ==========================================
pub struct WorkOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkOrderRepository {
    /// 创建新的WorkOrderRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 开启工作单元
    ///
    /// 工作单元持有连接锁并占用 SQLite 写锁，直到 commit 或 drop（回滚）。
    /// 注意：持有工作单元期间不要再调用共享同一连接的其他仓储方法，否则死锁。
    pub fn begin_unit(&self) -> RepositoryResult<WorkOrderUnit<'_>> {
        let conn = self.get_conn()?;
        WorkOrderUnit::begin(conn)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按工单号查询（含明细）
    pub fn find_by_id(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let conn = self.get_conn()?;
        load_work_order_on(&conn, work_order_id)
    }

    /// 查询工单状态
    pub fn find_status(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrderStatus>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT status FROM work_order WHERE work_order_id = ?1",
                params![work_order_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| parse_status(&s)).transpose()
    }

    // ==========================================
    // 写入（宿主文档层）
    // ==========================================

    /// 新增或覆盖工单（明细整体替换）
    pub fn upsert(&self, work_order: &WorkOrder) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO work_order (
                work_order_id, production_item, qty, wip_warehouse,
                source_warehouse, status, modified_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(work_order_id) DO UPDATE SET
                production_item = excluded.production_item,
                qty = excluded.qty,
                wip_warehouse = excluded.wip_warehouse,
                source_warehouse = excluded.source_warehouse,
                status = excluded.status,
                modified_at = excluded.modified_at
            "#,
            params![
                work_order.work_order_id,
                work_order.production_item,
                work_order.qty,
                work_order.wip_warehouse,
                work_order.source_warehouse,
                work_order.status.to_db_str(),
                work_order.modified_at.format(TS_FORMAT).to_string(),
            ],
        )?;

        tx.execute(
            "DELETE FROM work_order_item WHERE work_order_id = ?1",
            params![work_order.work_order_id],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO work_order_item (
                    work_order_id, idx, item_code, source_warehouse, stock_uom,
                    transferred_qty, consumed_qty, returned_qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for item in &work_order.required_items {
                stmt.execute(params![
                    work_order.work_order_id,
                    item.idx,
                    item.item_code,
                    item.source_warehouse,
                    item.stock_uom,
                    item.transferred_qty,
                    item.consumed_qty,
                    item.returned_qty,
                ])?;
            }
        }

        tx.commit()?;
        Ok(work_order.work_order_id.clone())
    }

    // ==========================================
    // 宿主事件模拟: 发料 / 耗用
    // ==========================================

    /// 发料到 WIP: transferred_qty += qty，库存从发料仓移到 WIP 仓
    pub fn record_material_transfer(
        &self,
        work_order_id: &str,
        item_idx: i32,
        qty: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let work_order = load_work_order_on(&tx, work_order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: work_order_id.to_string(),
            }
        })?;
        let item = find_item(&work_order, item_idx)?;
        let source = work_order
            .source_warehouse_for(item)
            .ok_or_else(|| RepositoryError::FieldValueError {
                field: "source_warehouse".to_string(),
                message: format!("{} 行{} 未指定发料仓", work_order_id, item_idx),
            })?
            .to_string();

        tx.execute(
            r#"UPDATE work_order_item
               SET transferred_qty = COALESCE(transferred_qty, 0) + ?1
               WHERE work_order_id = ?2 AND idx = ?3"#,
            params![qty, work_order_id, item_idx],
        )?;
        adjust_bin_on(&tx, &source, &item.item_code, -qty)?;
        adjust_bin_on(&tx, &work_order.wip_warehouse, &item.item_code, qty)?;
        touch_on(&tx, work_order_id)?;

        tx.commit()?;
        Ok(())
    }

    /// 生产耗用: consumed_qty += qty，WIP 仓库存减少
    pub fn record_consumption(
        &self,
        work_order_id: &str,
        item_idx: i32,
        qty: f64,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let work_order = load_work_order_on(&tx, work_order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkOrder".to_string(),
                id: work_order_id.to_string(),
            }
        })?;
        let item = find_item(&work_order, item_idx)?;

        tx.execute(
            r#"UPDATE work_order_item
               SET consumed_qty = COALESCE(consumed_qty, 0) + ?1
               WHERE work_order_id = ?2 AND idx = ?3"#,
            params![qty, work_order_id, item_idx],
        )?;
        adjust_bin_on(&tx, &work_order.wip_warehouse, &item.item_code, -qty)?;
        touch_on(&tx, work_order_id)?;

        tx.commit()?;
        Ok(())
    }
}

// ==========================================
// 连接级辅助函数（供工作单元与库存流水复用）
// ==========================================

/// 在给定连接上加载工单（含有序明细）
pub(crate) fn load_work_order_on(
    conn: &Connection,
    work_order_id: &str,
) -> RepositoryResult<Option<WorkOrder>> {
    let header = conn
        .query_row(
            r#"SELECT work_order_id, production_item, qty, wip_warehouse,
                      source_warehouse, status, modified_at
               FROM work_order WHERE work_order_id = ?1"#,
            params![work_order_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, production_item, qty, wip_warehouse, source_warehouse, status_raw, modified_raw)) =
        header
    else {
        return Ok(None);
    };

    let status = parse_status(&status_raw)?;
    let modified_at = NaiveDateTime::parse_from_str(&modified_raw, TS_FORMAT).map_err(|e| {
        RepositoryError::FieldValueError {
            field: "modified_at".to_string(),
            message: format!("{}: {}", modified_raw, e),
        }
    })?;

    let mut stmt = conn.prepare(
        r#"SELECT idx, item_code, source_warehouse, stock_uom,
                  transferred_qty, consumed_qty, returned_qty
           FROM work_order_item WHERE work_order_id = ?1
           ORDER BY idx"#,
    )?;
    let required_items = stmt
        .query_map(params![work_order_id], |row| {
            Ok(WorkOrderItem {
                idx: row.get(0)?,
                item_code: row.get(1)?,
                source_warehouse: row.get(2)?,
                stock_uom: row.get(3)?,
                transferred_qty: row.get(4)?,
                consumed_qty: row.get(5)?,
                returned_qty: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(WorkOrder {
        work_order_id: id,
        production_item,
        qty,
        wip_warehouse,
        source_warehouse,
        status,
        required_items,
        modified_at,
    }))
}

/// 更新工单修改时间
pub(crate) fn touch_on(conn: &Connection, work_order_id: &str) -> RepositoryResult<()> {
    conn.execute(
        "UPDATE work_order SET modified_at = ?1 WHERE work_order_id = ?2",
        params![
            chrono::Local::now().naive_local().format(TS_FORMAT).to_string(),
            work_order_id
        ],
    )?;
    Ok(())
}

fn parse_status(raw: &str) -> RepositoryResult<WorkOrderStatus> {
    WorkOrderStatus::parse(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "status".to_string(),
        message: format!("未知工单状态: {}", raw),
    })
}

fn find_item(work_order: &WorkOrder, item_idx: i32) -> RepositoryResult<&WorkOrderItem> {
    work_order
        .required_items
        .iter()
        .find(|i| i.idx == item_idx)
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "WorkOrderItem".to_string(),
            id: format!("{}#{}", work_order.work_order_id, item_idx),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use crate::repository::stock_ledger_repo::bin_qty_on;
    use chrono::Utc;

    fn setup() -> (Arc<Mutex<Connection>>, WorkOrderRepository) {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), WorkOrderRepository::new(conn))
    }

    fn make_order() -> WorkOrder {
        let mut wire = WorkOrderItem::new(1, "RM-WIRE", "Kg");
        wire.source_warehouse = Some("Stores - BWM".to_string());
        wire.transferred_qty = Some(10.0);
        let frame = WorkOrderItem::new(2, "RM-FRAME", "Nos");

        WorkOrder {
            work_order_id: "WO-0001".to_string(),
            production_item: "FG-MESH".to_string(),
            qty: 5.0,
            wip_warehouse: "WIP - BWM".to_string(),
            source_warehouse: Some("Main Store - BWM".to_string()),
            status: WorkOrderStatus::Submitted,
            required_items: vec![wire, frame],
            modified_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_upsert_and_find_by_id() {
        let (_conn, repo) = setup();
        repo.upsert(&make_order()).unwrap();

        let found = repo.find_by_id("WO-0001").unwrap().unwrap();
        assert_eq!(found.status, WorkOrderStatus::Submitted);
        assert_eq!(found.required_items.len(), 2);
        assert_eq!(found.required_items[0].item_code, "RM-WIRE");
        assert_eq!(found.required_items[0].transferred_qty, Some(10.0));
        assert_eq!(found.required_items[1].transferred_qty, None);

        assert!(repo.find_by_id("WO-MISSING").unwrap().is_none());
        assert_eq!(repo.find_status("WO-MISSING").unwrap(), None);
    }

    #[test]
    fn test_upsert_replaces_items() {
        let (_conn, repo) = setup();
        let mut order = make_order();
        repo.upsert(&order).unwrap();

        order.required_items.truncate(1);
        order.status = WorkOrderStatus::InProcess;
        repo.upsert(&order).unwrap();

        let found = repo.find_by_id("WO-0001").unwrap().unwrap();
        assert_eq!(found.required_items.len(), 1);
        assert_eq!(found.status, WorkOrderStatus::InProcess);
    }

    #[test]
    fn test_transfer_and_consumption_move_bins() {
        let (conn, repo) = setup();
        repo.upsert(&make_order()).unwrap();

        repo.record_material_transfer("WO-0001", 2, 3.0).unwrap();
        repo.record_consumption("WO-0001", 2, 1.0).unwrap();

        let found = repo.find_by_id("WO-0001").unwrap().unwrap();
        assert_eq!(found.required_items[1].transferred_qty, Some(3.0));
        assert_eq!(found.required_items[1].consumed_qty, Some(1.0));

        let c = conn.lock().unwrap();
        assert_eq!(bin_qty_on(&c, "WIP - BWM", "RM-FRAME").unwrap(), 2.0);
        // 明细未指定发料仓 → 使用工单默认发料仓
        assert_eq!(bin_qty_on(&c, "Main Store - BWM", "RM-FRAME").unwrap(), -3.0);
    }

    #[test]
    fn test_transfer_unknown_item_is_not_found() {
        let (_conn, repo) = setup();
        repo.upsert(&make_order()).unwrap();

        let result = repo.record_material_transfer("WO-0001", 9, 1.0);
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }
}
