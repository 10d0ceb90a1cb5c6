// ==========================================
// 配置管理器测试
// ==========================================
// 职责: 验证 config_kv 读写与默认值回退
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod config_test {
    use crate::test_helpers::create_test_db;
    use factory_ops::config::{config_keys, ConfigManager, FulfillmentConfigReader};

    #[test]
    fn test_defaults_without_rows() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let manager = ConfigManager::new(&db_path).unwrap();

        assert_eq!(manager.reservation_ttl_secs().unwrap(), 1800);
        assert_eq!(manager.conflict_max_retries().unwrap(), 3);
    }

    #[test]
    fn test_set_and_read_back() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let manager = ConfigManager::new(&db_path).unwrap();

        manager
            .set_global_config_value(config_keys::RESERVATION_TTL_SECS, "600")
            .unwrap();
        assert_eq!(manager.reservation_ttl_secs().unwrap(), 600);

        // 覆写走 UPSERT
        manager
            .set_global_config_value(config_keys::RESERVATION_TTL_SECS, "900")
            .unwrap();
        assert_eq!(manager.reservation_ttl_secs().unwrap(), 900);
    }

    #[test]
    fn test_unparseable_value_falls_back_to_default() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let manager = ConfigManager::new(&db_path).unwrap();

        manager
            .set_global_config_value(config_keys::CONFLICT_MAX_RETRIES, "not-a-number")
            .unwrap();
        assert_eq!(manager.conflict_max_retries().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_async_reader_trait_matches_sync_getters() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let manager = ConfigManager::new(&db_path).unwrap();

        manager
            .set_global_config_value(config_keys::RESERVATION_TTL_SECS, "120")
            .unwrap();

        assert_eq!(manager.get_reservation_ttl_secs().await.unwrap(), 120);
        assert_eq!(manager.get_conflict_max_retries().await.unwrap(), 3);
    }
}
