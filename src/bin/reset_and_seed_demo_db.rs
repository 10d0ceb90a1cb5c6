// ==========================================
// 演示数据库重置与初始化工具
// ==========================================
// 职责: 删除旧数据库，重建 schema，写入演示材料与库存
// 用法: cargo run --bin reset_and_seed_demo_db -- [db_path]
// 说明: 演示数据覆盖有库存、低库存、零库存三种材料，便于手工演练下单与缺口转产
// ==========================================

use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::Utc;
use rusqlite::params;

use factory_ops::app::get_default_db_path;
use factory_ops::db::{init_schema, open_sqlite_connection};

const DEMO_MATERIALS: &[(&str, &str, &str, i64)] = &[
    ("MAT-STEEL-01", "冷轧钢板 1.2mm", "PCS", 120),
    ("MAT-STEEL-02", "冷轧钢板 2.0mm", "PCS", 40),
    ("MAT-FRAME-01", "标准框架组件", "PCS", 0),
    ("MAT-PAINT-RD", "红色涂料", "KG", 500),
];

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args()
        .nth(1)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(get_default_db_path);

    if Path::new(&db_path).exists() {
        fs::remove_file(&db_path)?;
        println!("已删除旧数据库: {}", db_path);
    }

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    println!("数据库结构初始化完成: {}", db_path);

    let now = Utc::now().to_rfc3339();
    for (material_id, name, unit, on_hand) in DEMO_MATERIALS {
        conn.execute(
            "INSERT INTO material_master (material_id, name, unit, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![material_id, name, unit, now],
        )?;
        conn.execute(
            "INSERT INTO stock_balance (material_id, on_hand, updated_at)
             VALUES (?1, ?2, ?3)",
            params![material_id, on_hand, now],
        )?;
        println!("材料 {} ({}) 在库 {}", material_id, name, on_hand);
    }

    conn.execute(
        "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', 'reservation_ttl_secs', '1800')
         ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value",
        [],
    )?;

    println!("演示数据写入完成，共 {} 个材料", DEMO_MATERIALS.len());
    Ok(())
}
