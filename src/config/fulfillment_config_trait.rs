// ==========================================
// 制造运营平台 - 履约配置读取 Trait
// ==========================================
// 职责: 定义履约流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// FulfillmentConfigReader Trait
// ==========================================
// 用途: 缺口解析与履约协调所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait FulfillmentConfigReader: Send + Sync {
    /// 获取库存预留的 TTL（秒）
    ///
    /// # 返回
    /// - i64: 新建/续期预留的存活时长
    ///
    /// # 默认值
    /// - 1800（30 分钟）
    async fn get_reservation_ttl_secs(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取并发冲突的内部重试上限
    ///
    /// # 返回
    /// - u32: 预留写入遇忙碌错误时的最大重试次数
    ///
    /// # 默认值
    /// - 3
    async fn get_conflict_max_retries(&self) -> Result<u32, Box<dyn Error>>;
}
