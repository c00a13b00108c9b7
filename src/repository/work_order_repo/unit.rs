// ==========================================
// 工单 WIP 余料核对 - 工作单元
// ==========================================
// 一个工作单元 = 一个 BEGIN IMMEDIATE 事务 + 共享连接的互斥锁
// - commit 之前的所有写入要么全部生效，要么全部回滚
// - 未 commit 即被 drop 时自动 ROLLBACK
// - 其他连接的写者在 busy_timeout 内等待，之后读到的是提交后的状态
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::WorkOrder;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::work_order_repo::{load_work_order_on, TS_FORMAT};
use rusqlite::{params, Connection};
use std::sync::MutexGuard;

pub struct WorkOrderUnit<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> WorkOrderUnit<'a> {
    pub(crate) fn begin(conn: MutexGuard<'a, Connection>) -> RepositoryResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// 工作单元内的连接（供库存流水等协作方在同一事务内写入）
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// 在事务内加载工单
    pub fn load_work_order(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        load_work_order_on(&self.conn, work_order_id)
    }

    /// 状态比较并设置
    ///
    /// 仅当当前状态等于 `expected` 时更新为 `target`，否则返回 VersionConflict
    pub fn transition_status(
        &self,
        work_order_id: &str,
        expected: WorkOrderStatus,
        target: WorkOrderStatus,
    ) -> RepositoryResult<()> {
        let updated = self.conn.execute(
            r#"UPDATE work_order
               SET status = ?1, modified_at = ?2
               WHERE work_order_id = ?3 AND status = ?4"#,
            params![
                target.to_db_str(),
                chrono::Local::now().naive_local().format(TS_FORMAT).to_string(),
                work_order_id,
                expected.to_db_str(),
            ],
        )?;

        if updated == 0 {
            return Err(RepositoryError::VersionConflict {
                work_order_id: work_order_id.to_string(),
                expected: expected.to_db_str().to_string(),
            });
        }
        Ok(())
    }

    /// 在事务内写入操作日志
    pub fn insert_action_log(&self, log: &ActionLog) -> RepositoryResult<()> {
        ActionLogRepository::insert_on(&self.conn, log)
    }

    /// 提交
    pub fn commit(mut self) -> RepositoryResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for WorkOrderUnit<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "工作单元回滚失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use crate::domain::types::WorkOrderStatus;
    use crate::domain::work_order::WorkOrder;
    use crate::repository::error::RepositoryError;
    use crate::repository::work_order_repo::WorkOrderRepository;
    use chrono::Utc;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn setup() -> WorkOrderRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let repo = WorkOrderRepository::new(Arc::new(Mutex::new(conn)));
        repo.upsert(&WorkOrder {
            work_order_id: "WO-0001".to_string(),
            production_item: "FG-MESH".to_string(),
            qty: 1.0,
            wip_warehouse: "WIP - BWM".to_string(),
            source_warehouse: None,
            status: WorkOrderStatus::Submitted,
            required_items: vec![],
            modified_at: Utc::now().naive_utc(),
        })
        .unwrap();
        repo
    }

    #[test]
    fn test_commit_persists_transition() {
        let repo = setup();
        let unit = repo.begin_unit().unwrap();
        unit.transition_status("WO-0001", WorkOrderStatus::Submitted, WorkOrderStatus::Closed)
            .unwrap();
        unit.commit().unwrap();

        assert_eq!(repo.find_status("WO-0001").unwrap(), Some(WorkOrderStatus::Closed));
    }

    #[test]
    fn test_drop_rolls_back() {
        let repo = setup();
        {
            let unit = repo.begin_unit().unwrap();
            unit.transition_status("WO-0001", WorkOrderStatus::Submitted, WorkOrderStatus::Closed)
                .unwrap();
        }
        assert_eq!(repo.find_status("WO-0001").unwrap(), Some(WorkOrderStatus::Submitted));
    }

    #[test]
    fn test_stale_expected_status_conflicts() {
        let repo = setup();
        let unit = repo.begin_unit().unwrap();
        let result =
            unit.transition_status("WO-0001", WorkOrderStatus::Stopped, WorkOrderStatus::Closed);
        assert!(matches!(result, Err(RepositoryError::VersionConflict { .. })));
    }
}
