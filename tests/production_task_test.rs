// ==========================================
// 生产任务状态机测试
// ==========================================
// 职责: 验证迁移合法性、完工贷记原子语义、取消不触碰库存
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod production_task_test {
    use crate::test_helpers::{create_test_db, MockConfig, TestEnv};
    use chrono::Utc;
    use factory_ops::domain::production::NewProductionTask;
    use factory_ops::domain::types::TaskStatus;
    use factory_ops::engine::EngineError;

    fn seed_task(env: &TestEnv, material_id: &str, qty: i64) -> i64 {
        // 任务外键指向订单行，先落父行
        env.seed_order_item("O-1", "OI-1", material_id, qty);
        env.task_repo
            .insert(
                &NewProductionTask {
                    order_id: "O-1".to_string(),
                    order_item_id: "OI-1".to_string(),
                    material_id: material_id.to_string(),
                    qty_to_produce: qty,
                },
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn test_start_moves_pending_to_in_progress() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 0);
        let task_id = seed_task(&env, "MAT-A", 5);

        let task = env.state_machine.start(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.started_at.is_some());
    }

    #[tokio::test]
    async fn test_complete_from_pending_is_allowed() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 0);
        let task_id = seed_task(&env, "MAT-A", 5);

        // 跳过开工直接完工（短流程）
        let task = env.state_machine.complete(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert_eq!(env.ledger.on_hand("MAT-A").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_complete_credits_ledger_once() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 3);
        let task_id = seed_task(&env, "MAT-A", 7);

        env.state_machine.start(task_id).unwrap();
        env.state_machine.complete(task_id).await.unwrap();
        assert_eq!(env.ledger.on_hand("MAT-A").unwrap(), 10);

        // 重复完工被拒且不再贷记
        let err = env.state_machine.complete(task_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: TaskStatus::Completed,
                ..
            }
        ));
        assert_eq!(env.ledger.on_hand("MAT-A").unwrap(), 10);
    }

    #[test]
    fn test_cancel_never_touches_ledger() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 3);
        let task_id = seed_task(&env, "MAT-A", 7);

        let task = env.state_machine.cancel(task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert!(task.cancelled_at.is_some());
        assert_eq!(env.ledger.on_hand("MAT-A").unwrap(), 3);
    }

    #[test]
    fn test_start_after_cancel_is_invalid() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 0);
        let task_id = seed_task(&env, "MAT-A", 5);

        env.state_machine.cancel(task_id).unwrap();
        let err = env.state_machine.start(task_id).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: TaskStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_after_complete_is_invalid() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 0);
        let task_id = seed_task(&env, "MAT-A", 5);

        env.state_machine.complete(task_id).await.unwrap();
        let err = env.state_machine.cancel(task_id).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: TaskStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());

        assert!(matches!(
            env.state_machine.start(9999),
            Err(EngineError::NotFound { .. })
        ));
    }
}
