// ==========================================
// 工单 WIP 余料核对 - 提示信息国际化
// ==========================================
// 拦截提示、核对结果、状态错误均按 key 查表
// 语言: zh-CN（默认）/ en；rust_i18n::i18n! 在 lib.rs 中初始化
// ==========================================

use crate::domain::types::StatusAction;

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" 或 "en"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 按 key 查表（无插值）
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 状态动作在提示信息中的名称（"关闭" / "Close" ...）
///
/// # 示例
/// ```no_run
/// use wip_reconcile::i18n::action_label;
/// use wip_reconcile::StatusAction;
/// let label = action_label(StatusAction::Stop);
/// ```
pub fn action_label(action: StatusAction) -> String {
    t(&format!("action.{}", action.label()))
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use wip_reconcile::i18n::t_with_args;
/// let msg = t_with_args("reconcile.already_closed", &[("work_order", "WO-0001")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

/// 数量的展示格式（去掉无意义的小数位）
pub fn format_qty(qty: f64) -> String {
    format!("{}", qty)
}

// rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行；
// 为避免测试互相干扰，依赖 locale 的测试需串行化。
#[cfg(test)]
pub(crate) static LOCALE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_qty() {
        assert_eq!(format_qty(4.0), "4");
        assert_eq!(format_qty(0.25), "0.25");
    }

    #[test]
    fn test_locale_switch_changes_closed_message() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        assert_eq!(current_locale(), "en");
        let en = t_with_args("reconcile.closed", &[("work_order", "WO-0001")]);
        assert_eq!(en, "Work Order WO-0001 had no excess and was closed");

        set_locale("zh-CN");
        assert_eq!(current_locale(), "zh-CN");
        let zh = t_with_args("reconcile.closed", &[("work_order", "WO-0001")]);
        assert_eq!(zh, "工单 WO-0001 无余料，已直接关闭");
    }

    #[test]
    fn test_action_labels() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        assert_eq!(action_label(StatusAction::Close), "关闭");
        assert_eq!(action_label(StatusAction::Stop), "停止");

        set_locale("en");
        assert_eq!(action_label(StatusAction::Close), "Close");
        assert_eq!(action_label(StatusAction::Resume), "Resume");

        set_locale("zh-CN");
    }

    #[test]
    fn test_unknown_method_message() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        let msg = t_with_args("common.unknown_method", &[("method", "delete_work_order")]);
        assert_eq!(msg, "Unknown method: delete_work_order");
        set_locale("zh-CN");
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        let msg = t_with_args("reconcile.already_closed", &[("work_order", "WO-0001")]);
        assert!(msg.contains("WO-0001"));
        assert!(msg.contains("已关闭"));

        set_locale("en");
        let msg = t_with_args("reconcile.already_closed", &[("work_order", "WO-0001")]);
        assert_eq!(msg, "Work Order WO-0001 is already closed");

        // 恢复默认语言
        set_locale("zh-CN");
    }

    #[test]
    fn test_guard_line_template() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        let msg = t_with_args(
            "guard.item_line",
            &[
                ("item", "A"),
                ("excess", "4"),
                ("uom", "Kg"),
                ("transferred", "10"),
                ("consumed", "6"),
                ("returned", "0"),
            ],
        );
        assert_eq!(msg, "A: 4 Kg (Transferred: 10, Consumed: 6, Returned: 0)");
        set_locale("zh-CN");
    }
}
