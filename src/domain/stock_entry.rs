// ==========================================
// 工单 WIP 余料核对 - 退料单领域模型
// ==========================================
// 红线: 退料单一经提交即为不可变的库存流水
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 退料单用途
pub const PURPOSE_MATERIAL_RETURN: &str = "MATERIAL_RETURN";

/// 单据状态: 已提交
pub const DOCSTATUS_SUBMITTED: &str = "SUBMITTED";

// ==========================================
// ReturnLine - 退料行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub item_idx: i32,          // 对应工单明细行号
    pub item_code: String,      // 物料编码
    pub qty: f64,               // 退回数量 (库存单位)
    pub uom: String,            // 库存单位 (与工单明细一致)
    pub from_warehouse: String, // 出库仓 (WIP)
    pub to_warehouse: String,   // 入库仓 (发料仓)
}

// ==========================================
// ReturnTransactionDraft - 待提交的退料单
// ==========================================
// 由编排器生成，交给库存流水服务一次性提交
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnTransactionDraft {
    pub work_order_id: String,
    pub lines: Vec<ReturnLine>,
    pub created_by: String,
}

impl ReturnTransactionDraft {
    pub fn total_qty(&self) -> f64 {
        self.lines.iter().map(|l| l.qty).sum()
    }
}

// ==========================================
// ReturnTransaction - 已提交的退料单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnTransaction {
    pub name: String,           // 单号 (MAT-STE-xxxxxxxxxxxx)
    pub purpose: String,        // 用途
    pub work_order_id: String,  // 关联工单
    pub docstatus: String,      // 单据状态
    pub total_qty: f64,         // 合计数量
    pub posted_at: NaiveDateTime, // 过账时间
    pub created_by: String,     // 提交人
    pub lines: Vec<ReturnLine>, // 明细 (顺序与草稿一致)
}

impl ReturnTransaction {
    /// 生成退料单号
    pub fn new_name() -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("MAT-STE-{}", &id[..12]).to_uppercase()
    }
}
