// ==========================================
// 工单 WIP 余料核对 - 余料容差参数
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 余料容差
///
/// 余量先按 `round_digits` 舍入，再与所在单位的容差做严格大于比较。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcessTolerance {
    pub default: f64,                 // 默认容差
    pub per_uom: HashMap<String, f64>, // 按库存单位覆写 (键为大写单位)
    pub round_digits: u32,            // 舍入位数
}

impl ExcessTolerance {
    pub const DEFAULT_TOLERANCE: f64 = 0.01;
    pub const DEFAULT_ROUND_DIGITS: u32 = 3;
    pub const MAX_ROUND_DIGITS: u32 = 9;

    /// 指定单位的容差（无覆写时使用默认容差）
    pub fn for_uom(&self, uom: &str) -> f64 {
        self.per_uom
            .get(&uom.trim().to_uppercase())
            .copied()
            .unwrap_or(self.default)
    }

    /// 按配置位数四舍五入
    pub fn round(&self, qty: f64) -> f64 {
        let factor = 10f64.powi(self.round_digits.min(Self::MAX_ROUND_DIGITS) as i32);
        (qty * factor).round() / factor
    }
}

impl Default for ExcessTolerance {
    fn default() -> Self {
        Self {
            default: Self::DEFAULT_TOLERANCE,
            per_uom: HashMap::new(),
            round_digits: Self::DEFAULT_ROUND_DIGITS,
        }
    }
}
