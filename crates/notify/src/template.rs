//! Rendering of the human-readable alert body.
//!
//! The layout is fixed; a fresh [`minijinja::Environment`] is created per
//! render since the parameter set is small and emission is rare.

use serde::Serialize;

use crate::traits::NotifyError;

const MATH_TEMPLATE: &str = "\
告警名称：{{ name }}
告警类型：{{ category }}
业务域：{{ business_type }}
告警源：{{ origin }}
告警内容：{{ content }}
告警值：{{ value }}
告警时间：{{ datetime }}
负责人：{{ responsible_people }}
值异常检测准确率(测试阶段): {{ accuracy }}%";

const LOG_TEMPLATE: &str = "\
告警名称：{{ name }}
告警类型：{{ category }}
业务域：{{ business_type }}
告警源：{{ origin }}
告警内容：{{ content }}
告警详情: {{ message }}
告警值：{{ value }}
告警时间：{{ datetime }}
负责人：{{ responsible_people }}";

/// Parameters bound into the alert body template.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateParams {
    pub name: String,
    /// Human category label, see [`category_label`].
    pub category: String,
    pub business_type: String,
    pub origin: String,
    pub content: String,
    /// Formatted current value.
    pub value: String,
    /// `yyyy-MM-dd HH:mm:ss`.
    pub datetime: String,
    pub responsible_people: String,
    /// Placeholder accuracy figure, math alerts only.
    pub accuracy: Option<String>,
    /// Concatenated sampled documents, log alerts only.
    pub message: Option<String>,
}

/// Render the alert body. Log alerts (those carrying a `message`) get the
/// variant with the detail line and no accuracy figure.
pub fn render_alert(params: &TemplateParams) -> Result<String, NotifyError> {
    let source = if params.message.is_some() {
        LOG_TEMPLATE
    } else {
        MATH_TEMPLATE
    };

    let mut env = minijinja::Environment::new();
    env.add_template("alert", source)
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    let tmpl = env
        .get_template("alert")
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    tmpl.render(params)
        .map_err(|e| NotifyError::Template(e.to_string()))
}

/// Human label for the category tag.
pub fn category_label(category: i16) -> &'static str {
    match category {
        1 => "前端告警",
        2 => "业务告警",
        3 => "应用告警",
        4 => "组件告警",
        5 => "系统告警",
        _ => "业务告警",
    }
}

/// Format a numeric value the way it reads in alert text: no trailing
/// fraction for whole numbers (80, not 80.0).
pub fn fmt_value(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TemplateParams {
        TemplateParams {
            name: "cpu_hi".into(),
            category: category_label(5).into(),
            business_type: "infra".into(),
            origin: "host-7".into(),
            content: "规则名称 【cpu_hi】触发告警, 当前值为: 91.3, 阈值为: 80".into(),
            value: "91.3".into(),
            datetime: "2024-06-01 12:00:00".into(),
            responsible_people: "ops".into(),
            accuracy: Some("73.52".into()),
            message: None,
        }
    }

    #[test]
    fn math_body_layout() {
        let body = render_alert(&params()).unwrap();
        assert!(body.starts_with("告警名称：cpu_hi\n"));
        assert!(body.contains("告警类型：系统告警"));
        assert!(body.contains("告警值：91.3"));
        assert!(body.contains("当前值为: 91.3, 阈值为: 80"));
        assert!(body.ends_with("值异常检测准确率(测试阶段): 73.52%"));
        assert!(!body.contains("告警详情"));
    }

    #[test]
    fn log_body_has_detail_line_and_no_accuracy() {
        let mut p = params();
        p.message = Some("{err1} {err2}".into());
        let body = render_alert(&p).unwrap();
        assert!(body.contains("告警详情: {err1} {err2}"));
        assert!(!body.contains("准确率"));
    }

    #[test]
    fn category_labels() {
        assert_eq!(category_label(1), "前端告警");
        assert_eq!(category_label(5), "系统告警");
        assert_eq!(category_label(9), "业务告警");
    }

    #[test]
    fn value_formatting_drops_whole_fraction() {
        assert_eq!(fmt_value(80.0), "80");
        assert_eq!(fmt_value(91.3), "91.3");
        assert_eq!(fmt_value(0.2), "0.2");
        assert_eq!(fmt_value(-3.0), "-3");
    }
}
