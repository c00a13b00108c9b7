// ==========================================
// 工单 WIP 余料核对 - 工单领域模型
// ==========================================
// 红线: 工单明细数量只由外部发料/耗用/退料事件改变，
//       本系统仅通过自己生成的退料单改变 returned_qty
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::WorkOrderStatus;

// ==========================================
// WorkOrder - 生产工单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub work_order_id: String,            // 工单号
    pub production_item: String,          // 成品物料
    pub qty: f64,                         // 计划数量
    pub wip_warehouse: String,            // 在制品仓
    pub source_warehouse: Option<String>, // 默认发料仓 (明细未指定时使用)
    pub status: WorkOrderStatus,          // 状态
    pub required_items: Vec<WorkOrderItem>, // 需求物料明细 (有序)
    pub modified_at: NaiveDateTime,       // 最后修改时间
}

impl WorkOrder {
    /// 明细发料仓，未指定时回退到工单默认发料仓
    pub fn source_warehouse_for<'a>(&'a self, item: &'a WorkOrderItem) -> Option<&'a str> {
        let non_empty = |w: &&str| !w.trim().is_empty();
        item.source_warehouse
            .as_deref()
            .filter(non_empty)
            .or(self.source_warehouse.as_deref().filter(non_empty))
    }
}

// ==========================================
// WorkOrderItem - 工单需求物料行
// ==========================================
// 数量字段允许缺失 (NULL)，计算时视为 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderItem {
    pub idx: i32,                         // 行号
    pub item_code: String,                // 物料编码
    pub source_warehouse: Option<String>, // 发料仓
    pub stock_uom: String,                // 库存单位
    pub transferred_qty: Option<f64>,     // 累计发料到 WIP
    pub consumed_qty: Option<f64>,        // 累计生产耗用
    pub returned_qty: Option<f64>,        // 累计已退回
}

impl WorkOrderItem {
    pub fn new(idx: i32, item_code: &str, stock_uom: &str) -> Self {
        Self {
            idx,
            item_code: item_code.to_string(),
            source_warehouse: None,
            stock_uom: stock_uom.to_string(),
            transferred_qty: None,
            consumed_qty: None,
            returned_qty: None,
        }
    }

    pub fn transferred(&self) -> f64 {
        qty_or_zero(self.transferred_qty)
    }

    pub fn consumed(&self) -> f64 {
        qty_or_zero(self.consumed_qty)
    }

    pub fn returned(&self) -> f64 {
        qty_or_zero(self.returned_qty)
    }

    /// 未经舍入与容差处理的原始余量 (可能为负)
    pub fn raw_excess(&self) -> f64 {
        self.transferred() - self.consumed() - self.returned()
    }
}

fn qty_or_zero(v: Option<f64>) -> f64 {
    v.filter(|q| q.is_finite()).unwrap_or(0.0)
}
