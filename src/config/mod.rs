// ==========================================
// 制造运营平台 - 配置层
// ==========================================

pub mod config_manager;
pub mod fulfillment_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use fulfillment_config_trait::FulfillmentConfigReader;
