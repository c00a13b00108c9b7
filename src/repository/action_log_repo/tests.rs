use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new("WO-0001", ActionType::ReturnAndClose, "user1")
        .with_payload(json!({"stock_entry": "MAT-STE-1", "total_returned_qty": 4.0}))
        .with_detail("退料并关闭");
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.work_order_id, "WO-0001");
    assert_eq!(found.action_type, "RETURN_AND_CLOSE");
    assert_eq!(found.actor, "user1");
    assert_eq!(found.payload_json.unwrap()["stock_entry"], "MAT-STE-1");
    assert_eq!(found.detail.as_deref(), Some("退料并关闭"));

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_work_order() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new("WO-0001", ActionType::Stop, "u1")).unwrap();
    repo.insert(&ActionLog::new("WO-0001", ActionType::Resume, "u1")).unwrap();
    repo.insert(&ActionLog::new("WO-0002", ActionType::Close, "u2")).unwrap();

    let logs = repo.find_by_work_order("WO-0001").unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_type, "STOP");
    assert_eq!(logs[1].action_type, "RESUME");
}

#[test]
fn test_find_and_count_by_action_type() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new("WO-0001", ActionType::DirectClose, "u1")).unwrap();
    repo.insert(&ActionLog::new("WO-0002", ActionType::DirectClose, "u1")).unwrap();
    repo.insert(&ActionLog::new("WO-0002", ActionType::Reopen, "u1")).unwrap();

    assert_eq!(repo.find_by_action_type("DIRECT_CLOSE", 10).unwrap().len(), 2);
    assert_eq!(repo.find_by_action_type("DIRECT_CLOSE", 1).unwrap().len(), 1);
    assert_eq!(
        repo.count_by_work_order_and_type("WO-0002", "REOPEN").unwrap(),
        1
    );
    assert_eq!(
        repo.count_by_work_order_and_type("WO-0001", "REOPEN").unwrap(),
        0
    );
}
