// ==========================================
// 并发退料并关闭测试
// ==========================================
// 职责: 两个独立连接同时对同一工单执行退料并关闭
// 期望: 恰好一次退料，另一方看到已关闭
// ==========================================


#[cfg(test)]
mod concurrent_return_test {
    use std::sync::Barrier;
    use std::thread;

    use wip_reconcile::app::AppState;
    use wip_reconcile::domain::types::{ReconciliationStatus, WorkOrderStatus};

    use crate::test_helpers::*;

    #[test]
    fn test_concurrent_return_and_close_returns_once() {
        let (_tmp, db_path) = create_test_db().unwrap();

        // 两个 AppState = 两条 SQLite 连接（模拟两个进程/会话）
        let state_a = AppState::new(db_path.clone()).unwrap();
        let state_b = AppState::new(db_path.clone()).unwrap();

        seed_issued_order(
            &state_a,
            "WO-0001",
            WorkOrderStatus::InProcess,
            &[seed("A", "Kg", 10.0, 6.0), seed("B", "Nos", 5.0, 2.0)],
        );

        let barrier = Barrier::new(2);
        let results: Vec<ReconciliationStatus> = thread::scope(|s| {
            let handles: Vec<_> = [&state_a, &state_b]
                .into_iter()
                .enumerate()
                .map(|(i, state)| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        state
                            .work_order_api
                            .return_and_close("WO-0001", Some(format!("user-{}", i).as_str()))
                            .unwrap()
                            .status
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let returned = results
            .iter()
            .filter(|s| **s == ReconciliationStatus::ReturnedAndClosed)
            .count();
        let no_action = results
            .iter()
            .filter(|s| **s == ReconciliationStatus::NoAction)
            .count();
        assert_eq!(returned, 1, "results: {:?}", results);
        assert_eq!(no_action, 1, "results: {:?}", results);

        // 两侧读到同一份持久化结果
        for state in [&state_a, &state_b] {
            assert_eq!(status_of(state, "WO-0001"), WorkOrderStatus::Closed);
            assert_eq!(state.stock_ledger_repo.count_by_work_order("WO-0001").unwrap(), 1);
            assert_eq!(state.stock_ledger_repo.get_bin_qty(WIP, "A").unwrap(), 0.0);
            assert_eq!(state.stock_ledger_repo.get_bin_qty(STORES, "A").unwrap(), 4.0);
            assert_eq!(state.stock_ledger_repo.get_bin_qty(STORES, "B").unwrap(), 3.0);
        }

        let logs = state_a
            .action_log_repo
            .count_by_work_order_and_type("WO-0001", "RETURN_AND_CLOSE")
            .unwrap();
        assert_eq!(logs, 1);
    }

    #[test]
    fn test_concurrent_close_requests_on_clean_order() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let states: Vec<AppState> = (0..4)
            .map(|_| AppState::new(db_path.clone()).unwrap())
            .collect();

        seed_issued_order(
            &states[0],
            "WO-0002",
            WorkOrderStatus::Submitted,
            &[seed("A", "Kg", 3.0, 3.0)],
        );

        let barrier = Barrier::new(states.len());
        let results: Vec<ReconciliationStatus> = thread::scope(|s| {
            let handles: Vec<_> = states
                .iter()
                .map(|state| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        state
                            .work_order_api
                            .return_and_close("WO-0002", None)
                            .unwrap()
                            .status
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(
            results
                .iter()
                .filter(|s| **s == ReconciliationStatus::Closed)
                .count(),
            1
        );
        assert_eq!(
            results
                .iter()
                .filter(|s| **s == ReconciliationStatus::NoAction)
                .count(),
            3
        );
        assert_eq!(
            states[0]
                .action_log_repo
                .count_by_work_order_and_type("WO-0002", "DIRECT_CLOSE")
                .unwrap(),
            1
        );
    }
}
