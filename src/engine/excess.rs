// ==========================================
// 工单 WIP 余料核对 - 余料计算器
// ==========================================
// 余量 = 发料 - 耗用 - 已退
// 红线: 纯函数，不访问存储，不改变任何数量
// - 缺失数量视为 0
// - 负余量（超退）视为无余料
// - 先舍入，再与单位容差做严格大于比较
// - 输出顺序与工单明细顺序一致
// ==========================================

use crate::config::ExcessTolerance;
use crate::domain::work_order::WorkOrderItem;
use serde::{Deserialize, Serialize};

// ==========================================
// ExcessItem - 余料行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcessItem {
    pub idx: i32,                         // 工单明细行号
    pub item_code: String,                // 物料编码
    pub excess_qty: f64,                  // 余量 (已舍入，用于容差比较与提示)
    pub return_qty: f64,                  // 应退数量 (未舍入，退料单按此数量移库)
    pub stock_uom: String,                // 库存单位
    pub transferred_qty: f64,             // 发料
    pub consumed_qty: f64,                // 耗用
    pub returned_qty: f64,                // 已退
    pub source_warehouse: Option<String>, // 明细发料仓
}

// ==========================================
// ExcessCalculator - 余料计算器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ExcessCalculator {
    tolerance: ExcessTolerance,
}

impl ExcessCalculator {
    pub fn new(tolerance: ExcessTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &ExcessTolerance {
        &self.tolerance
    }

    /// 计算超出容差的余料行
    pub fn compute(&self, items: &[WorkOrderItem]) -> Vec<ExcessItem> {
        items.iter().filter_map(|item| self.evaluate(item)).collect()
    }

    /// 单行判定
    ///
    /// # 返回
    /// - Some(ExcessItem): 余量严格大于该单位容差
    /// - None: 无余料（含负余量）
    pub fn evaluate(&self, item: &WorkOrderItem) -> Option<ExcessItem> {
        let raw = item.raw_excess();
        let excess = self.tolerance.round(raw);
        if !excess.is_finite() || excess <= self.tolerance.for_uom(&item.stock_uom) {
            return None;
        }

        Some(ExcessItem {
            idx: item.idx,
            item_code: item.item_code.clone(),
            excess_qty: excess,
            return_qty: raw.max(0.0),
            stock_uom: item.stock_uom.clone(),
            transferred_qty: item.transferred(),
            consumed_qty: item.consumed(),
            returned_qty: item.returned(),
            source_warehouse: item.source_warehouse.clone(),
        })
    }

    /// 是否存在余料
    pub fn has_excess(&self, items: &[WorkOrderItem]) -> bool {
        items.iter().any(|item| self.evaluate(item).is_some())
    }
}
