// ==========================================
// 缺口解析器测试
// ==========================================
// 职责: 验证净额解析（先吃库存、缺口转产）与幂等重解析
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod shortage_resolver_test {
    use crate::test_helpers::{create_test_db, MockConfig, TestEnv};
    use chrono::Utc;
    use factory_ops::domain::types::{ShortageAction, TaskStatus};
    use factory_ops::domain::{OrderDraft, OrderLineDraft};

    fn draft(material_id: &str, quantity: i64) -> OrderDraft {
        OrderDraft {
            source: Some("TEST".to_string()),
            customer_name: Some("测试客户".to_string()),
            user_id: "tester".to_string(),
            lines: vec![OrderLineDraft {
                material_id: material_id.to_string(),
                quantity,
                unit_price: None,
                shortage_action: ShortageAction::Produce,
                item_description: None,
                color: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_full_reservation_no_task() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 10);

        let outcome = env.coordinator.submit_order(&draft("MAT-A", 4)).await.unwrap();
        let resolution = &outcome.resolutions[0];

        assert_eq!(resolution.reserved_qty, 4);
        assert_eq!(resolution.shortfall_qty, 0);
        assert!(resolution.created_task_id.is_none());
        assert_eq!(env.ledger.available("MAT-A").unwrap(), 6);
        assert!(env.task_repo.list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_stock_creates_task_for_full_qty() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 0);

        let outcome = env.coordinator.submit_order(&draft("MAT-A", 1)).await.unwrap();
        let resolution = &outcome.resolutions[0];

        assert_eq!(resolution.reserved_qty, 0);
        assert_eq!(resolution.shortfall_qty, 1);

        let task_id = resolution.created_task_id.expect("应创建生产任务");
        let task = env.task_repo.find_by_id(task_id).unwrap().unwrap();
        assert_eq!(task.qty_to_produce, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.material_id, "MAT-A");
    }

    #[tokio::test]
    async fn test_partial_reservation_plus_task() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 2);

        let outcome = env.coordinator.submit_order(&draft("MAT-A", 5)).await.unwrap();
        let resolution = &outcome.resolutions[0];

        assert_eq!(resolution.reserved_qty, 2);
        assert_eq!(resolution.shortfall_qty, 3);

        let task_id = resolution.created_task_id.expect("应创建生产任务");
        let task = env.task_repo.find_by_id(task_id).unwrap().unwrap();
        assert_eq!(task.qty_to_produce, 3);

        // 库存被吃空
        assert_eq!(env.ledger.available("MAT-A").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_re_resolution_is_idempotent() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 2);

        let outcome = env.coordinator.submit_order(&draft("MAT-A", 5)).await.unwrap();
        let first = outcome.resolutions[0].clone();
        let item_id = first.order_item_id.clone();

        // 重复解析: 不新增预留、不重复建任务，返回同一对数字
        let second = env.resolver.resolve_by_id(&item_id, "tester").await.unwrap();
        assert_eq!(second.reserved_qty, first.reserved_qty);
        assert_eq!(second.shortfall_qty, first.shortfall_qty);
        assert!(second.created_task_id.is_none());

        assert_eq!(env.reservation_manager.active_total("MAT-A").unwrap(), 2);
        assert_eq!(env.task_repo.list(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_re_resolution_tops_up_after_restock() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let env = TestEnv::build(&db_path, MockConfig::default());
        env.seed_material("MAT-A", 2);

        let outcome = env.coordinator.submit_order(&draft("MAT-A", 5)).await.unwrap();
        let item_id = outcome.resolutions[0].order_item_id.clone();
        let task_id = outcome.resolutions[0].created_task_id.unwrap();

        // 任务取消后缺口重新打开，收货补足库存再解析
        env.state_machine.cancel(task_id).unwrap();
        env.ledger.credit("MAT-A", 10).unwrap();

        let resolution = env.resolver.resolve_by_id(&item_id, "tester").await.unwrap();
        assert_eq!(resolution.reserved_qty, 5);
        assert_eq!(resolution.shortfall_qty, 0);
        assert!(resolution.created_task_id.is_none());
        assert_eq!(env.reservation_manager.active_total("MAT-A").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_re_resolution_after_expiry_reconciles_and_re_reserves() {
        let (_tmp, db_path) = create_test_db().unwrap();

        // 极短 TTL 提交: 预留落下即过期，落账占用量与活跃预留脱节
        let item_id = {
            let env = TestEnv::build(&db_path, MockConfig::with_ttl_secs(-1));
            env.seed_material("MAT-A", 10);
            let outcome = env.coordinator.submit_order(&draft("MAT-A", 4)).await.unwrap();
            let item_id = outcome.resolutions[0].order_item_id.clone();

            assert_eq!(outcome.resolutions[0].reserved_qty, 4);
            assert_eq!(env.reservation_manager.active_total("MAT-A").unwrap(), 0);
            assert_eq!(env.ledger.available("MAT-A").unwrap(), 10);
            item_id
        };

        // 正常 TTL 重建环境: 等待行不被失效的落账量遮蔽
        let env = TestEnv::build(&db_path, MockConfig::default());
        let waiting = env
            .item_repo
            .list_waiting_by_material("MAT-A", Utc::now())
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].order_item_id, item_id);

        // 重解析: 回写实际占用量后重新预留，库存充足不建任务
        let resolution = env.resolver.resolve_by_id(&item_id, "tester").await.unwrap();
        assert_eq!(resolution.reserved_qty, 4);
        assert_eq!(resolution.shortfall_qty, 0);
        assert!(resolution.created_task_id.is_none());
        assert_eq!(env.reservation_manager.active_total("MAT-A").unwrap(), 4);

        let item = env.item_repo.find_by_id(&item_id).unwrap().unwrap();
        assert_eq!(item.qty_reserved_from_stock, 4);
    }
}
