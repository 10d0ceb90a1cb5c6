// ==========================================
// API 层测试
// ==========================================
// 职责: 验证边界校验、DTO 组装与 ActionLog 落账
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod api_test {
    use crate::test_helpers::{create_test_db, MockConfig, TestEnv};
    use factory_ops::api::{
        ApiError, InventoryApi, OrderApi, SubmitOrderItemRequest, SubmitOrderRequest, TaskApi,
    };
    use factory_ops::domain::types::OrderStatus;
    use std::sync::Arc;

    struct ApiEnv {
        env: TestEnv,
        order_api: OrderApi<MockConfig>,
        task_api: TaskApi,
        inventory_api: InventoryApi,
    }

    fn setup(db_path: &str) -> ApiEnv {
        let env = TestEnv::build(db_path, MockConfig::default());
        let order_api = OrderApi::new(
            env.coordinator.clone(),
            env.order_repo.clone(),
            env.item_repo.clone(),
            env.task_repo.clone(),
            env.action_log_repo.clone(),
        );
        let task_api = TaskApi::new(
            env.state_machine.clone(),
            env.task_repo.clone(),
            env.action_log_repo.clone(),
        );
        let inventory_api = InventoryApi::new(
            env.ledger.clone(),
            env.reservation_manager.clone(),
            env.action_log_repo.clone(),
        );
        ApiEnv {
            env,
            order_api,
            task_api,
            inventory_api,
        }
    }

    fn request(material_id: &str, quantity: i64, shortage_action: &str) -> SubmitOrderRequest {
        SubmitOrderRequest {
            source: Some("TEST".to_string()),
            customer_name: Some("测试客户".to_string()),
            user_id: "tester".to_string(),
            items: vec![SubmitOrderItemRequest {
                material_id: material_id.to_string(),
                quantity,
                unit_price: None,
                shortage_action: shortage_action.to_string(),
                item_description: None,
                color: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_submit_order_writes_action_log() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 10);

        let outcome = api.order_api.submit_order(request("MAT-A", 4, "PRODUCE")).await.unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Confirmed);

        let logs = api.env.action_log_repo.list_recent(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "SUBMIT_ORDER");
        assert_eq!(logs[0].actor, "tester");
        assert_eq!(logs[0].order_id.as_deref(), Some(outcome.order.order_id.as_str()));
    }

    #[tokio::test]
    async fn test_submit_order_rejects_unknown_shortage_action() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 10);

        let err = api
            .order_api
            .submit_order(request("MAT-A", 4, "BACKORDER"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert!(api.env.order_repo.list_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shortage_action_is_case_insensitive() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 10);

        api.order_api
            .submit_order(request("MAT-A", 4, "produce"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_order_detail_includes_items_and_tasks() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 1);

        let outcome = api.order_api.submit_order(request("MAT-A", 5, "PRODUCE")).await.unwrap();
        let detail = api.order_api.get_order_detail(&outcome.order.order_id).unwrap();

        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].qty_reserved_from_stock, 1);
        assert_eq!(detail.tasks.len(), 1);
        assert_eq!(detail.tasks[0].qty_to_produce, 4);
    }

    #[tokio::test]
    async fn test_patch_task_rejects_unknown_action() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 0);

        let outcome = api.order_api.submit_order(request("MAT-A", 2, "PRODUCE")).await.unwrap();
        let task_id = outcome.resolutions[0].created_task_id.unwrap();

        let err = api
            .task_api
            .patch_task(task_id, "deliver", "operator")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_patch_task_complete_flows_through_state_machine() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 0);

        let outcome = api.order_api.submit_order(request("MAT-A", 2, "PRODUCE")).await.unwrap();
        let task_id = outcome.resolutions[0].created_task_id.unwrap();

        api.task_api.patch_task(task_id, "start", "operator").await.unwrap();
        let task = api.task_api.patch_task(task_id, "complete", "operator").await.unwrap();
        assert_eq!(task.status.to_db_str(), "COMPLETED");
        assert_eq!(api.env.ledger.on_hand("MAT-A").unwrap(), 2);

        // 非法重复完工作为客户端错误浮出
        let err = api
            .task_api
            .patch_task(task_id, "complete", "operator")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_receive_stock_credits_and_logs() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 3);

        let new_on_hand = api.inventory_api.receive_stock("MAT-A", 7, "warehouse").unwrap();
        assert_eq!(new_on_hand, 10);

        let logs = api.env.action_log_repo.list_recent(10).unwrap();
        assert_eq!(logs[0].action_type, "RECEIVE_STOCK");
        assert_eq!(logs[0].material_id.as_deref(), Some("MAT-A"));
    }

    #[test]
    fn test_receive_stock_rejects_non_positive_qty() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 3);

        let err = api.inventory_api.receive_stock("MAT-A", -2, "warehouse").unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_snapshot_sweeps_expired_reservations_first() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = setup(&db_path);
        api.env.seed_material("MAT-A", 10);
        api.env.seed_order_item("O-1", "OI-1", "MAT-A", 6);

        api.env
            .reservation_manager
            .reserve("MAT-A", "O-1", "OI-1", "tester", 6, -1)
            .unwrap();

        let snapshot = api.inventory_api.snapshot().unwrap();
        let row = snapshot.iter().find(|r| r.material_id == "MAT-A").unwrap();
        assert_eq!(row.reserved, 0);
        assert_eq!(row.available, 10);

        // 清扫确实删除了过期行
        assert!(api.env.reservation_manager.list_active().unwrap().is_empty());
    }
}
