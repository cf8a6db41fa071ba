use crate::check::CheckReport;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(report: &CheckReport) -> String {
        let mut value = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(ref mut map) = value {
            map.insert("passed".to_string(), report.passed().into());
            map.insert("failed".to_string(), report.failed().into());
        }
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}
