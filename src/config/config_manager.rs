// ==========================================
// 工单 WIP 余料核对 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// 约定: 缺失或格式错误的配置回退到默认值并告警
// ==========================================

use crate::config::tolerance::ExcessTolerance;
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const GLOBAL_SCOPE: &str = "global";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 在给定连接上读取 global 配置值
    ///
    /// 供已持有连接（例如处于工作单元内）的调用方使用，避免重复加锁。
    pub fn get_value_on(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![GLOBAL_SCOPE, key],
            |row| row.get::<_, String>(0),
        )
        .optional()
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        Ok(Self::get_value_on(&conn, key)?)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES (?1, ?2, ?3, datetime('now'))
               ON CONFLICT(scope_id, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![GLOBAL_SCOPE, key, value],
        )?;
        Ok(())
    }

    /// 读取带前缀的全部 global 配置
    fn get_values_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = ?1 AND key LIKE ?2 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![GLOBAL_SCOPE, format!("{}%", prefix)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        // LIKE 中的 '_' 是通配符，这里再做一次精确前缀过滤
        Ok(rows.into_iter().filter(|(k, _)| k.starts_with(prefix)).collect())
    }

    // ===== 余料容差 =====

    /// 获取余料容差配置（默认值 + 按单位覆写 + 舍入位数）
    pub fn get_excess_tolerance(&self) -> Result<ExcessTolerance, Box<dyn Error>> {
        let defaults = ExcessTolerance::default();

        let default = parse_or_default(
            config_keys::EXCESS_TOLERANCE,
            self.get_global_config_value(config_keys::EXCESS_TOLERANCE)?,
            defaults.default,
        );
        let default = non_negative_or(config_keys::EXCESS_TOLERANCE, default, defaults.default);

        let round_digits = {
            let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            Self::round_digits_on(&conn)?
        };

        let prefix = format!("{}/", config_keys::EXCESS_TOLERANCE);
        let mut per_uom = HashMap::new();
        for (key, raw) in self.get_values_with_prefix(&prefix)? {
            let uom = key[prefix.len()..].trim().to_uppercase();
            if uom.is_empty() {
                continue;
            }
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => {
                    per_uom.insert(uom, v);
                }
                _ => tracing::warn!(key = %key, value = %raw, "单位容差配置无效，已忽略"),
            }
        }

        Ok(ExcessTolerance {
            default,
            per_uom,
            round_digits,
        })
    }

    /// 在给定连接上读取余量舍入位数
    pub fn round_digits_on(conn: &Connection) -> rusqlite::Result<u32> {
        let raw = Self::get_value_on(conn, config_keys::EXCESS_ROUND_DIGITS)?;
        Ok(parse_or_default(
            config_keys::EXCESS_ROUND_DIGITS,
            raw,
            ExcessTolerance::DEFAULT_ROUND_DIGITS,
        )
        .min(ExcessTolerance::MAX_ROUND_DIGITS))
    }

    // ===== 库存 =====

    /// 是否允许负库存（跳过 WIP 结存校验）
    pub fn allow_negative_stock(&self) -> Result<bool, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        Ok(Self::allow_negative_stock_on(&conn)?)
    }

    /// 在给定连接上读取 allow_negative_stock
    pub fn allow_negative_stock_on(conn: &Connection) -> rusqlite::Result<bool> {
        let raw = Self::get_value_on(conn, config_keys::ALLOW_NEGATIVE_STOCK)?;
        Ok(parse_bool_or_default(
            config_keys::ALLOW_NEGATIVE_STOCK,
            raw,
            false,
        ))
    }
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Copy,
{
    match raw {
        None => default,
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key = %key, value = %s, "配置值格式错误，使用默认值");
            default
        }),
    }
}

fn non_negative_or(key: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::warn!(key = %key, value, "配置值越界，使用默认值");
        default
    }
}

fn parse_bool_or_default(key: &str, raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
        None => default,
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key = %key, value = %s, "布尔配置格式错误，使用默认值");
                default
            }
        },
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 余料容差（默认值；按单位覆写使用 "excess_tolerance/<UOM>"）
    pub const EXCESS_TOLERANCE: &str = "excess_tolerance";
    // 舍入位数（与容差比较前）
    pub const EXCESS_ROUND_DIGITS: &str = "excess_round_digits";

    // 允许负库存
    pub const ALLOW_NEGATIVE_STOCK: &str = "allow_negative_stock";
}
