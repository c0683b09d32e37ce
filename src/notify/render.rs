// src/notify/render.rs
//! Human-readable alert renderings: subject line, plain text and HTML.

use serde_json::Value;
use std::fmt::Write as _;

use crate::alerts::Alert;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";
const FOOTER: &str = "This alert was generated automatically by the AI Brand Monitoring System.";
const FOOTER_HINT: &str = "See the dashboard for the full analysis.";

pub fn subject(alert: &Alert) -> String {
    format!(
        "[AI Monitor Alert] {} - {}",
        alert.rule_name,
        alert.severity.as_str().to_uppercase()
    )
}

/// Strings render bare; everything else as compact JSON.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn plain_text(alert: &Alert) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AI monitor alert: {}", alert.rule_name);
    out.push('\n');
    let _ = writeln!(out, "Time: {}", alert.timestamp.format(TIMESTAMP_FMT));
    let _ = writeln!(out, "Severity: {}", alert.severity.as_str().to_uppercase());
    out.push('\n');
    let _ = writeln!(out, "Details:\n{}", alert.message);
    out.push('\n');
    out.push_str("Data:\n");
    for (k, v) in &alert.data {
        let _ = writeln!(out, "- {}: {}", k, display_value(v));
    }
    out.push_str("\n---\n");
    let _ = writeln!(out, "{FOOTER}\n{FOOTER_HINT}");
    out
}

pub fn html(alert: &Alert) -> String {
    use html_escape::encode_text;

    let color = alert.severity.color();
    let mut rows = String::new();
    for (k, v) in &alert.data {
        let _ = write!(
            rows,
            "<tr><th>{}</th><td>{}</td></tr>",
            encode_text(k),
            encode_text(&display_value(v))
        );
    }

    format!(
        r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
body {{ font-family: Arial, sans-serif; margin: 20px; }}
.header {{ background-color: {color}; color: white; padding: 15px; border-radius: 5px; }}
.content {{ padding: 20px; border: 1px solid #ddd; border-radius: 5px; margin-top: 10px; }}
.data-table {{ width: 100%; border-collapse: collapse; margin-top: 15px; }}
.data-table th, .data-table td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
.data-table th {{ background-color: #f2f2f2; }}
.timestamp {{ color: #666; font-size: 0.9em; }}
</style>
</head>
<body>
<div class="header">
<h2>AI monitor alert</h2>
<h3>{rule}</h3>
<p class="timestamp">Time: {ts}</p>
</div>
<div class="content">
<h4>Details</h4>
<p>{message}</p>
<h4>Severity</h4>
<p style="color: {color}; font-weight: bold;">{severity}</p>
<h4>Data</h4>
<table class="data-table">{rows}</table>
<hr style="margin: 20px 0;">
<p style="font-size: 0.9em; color: #666;">{FOOTER}<br>{FOOTER_HINT}</p>
</div>
</body>
</html>
"##,
        rule = encode_text(&alert.rule_name),
        ts = alert.timestamp.format(TIMESTAMP_FMT),
        message = encode_text(&alert.message),
        severity = alert.severity.as_str().to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertData, Severity};
    use chrono::{TimeZone, Utc};

    fn alert(sev: Severity) -> Alert {
        let mut data = AlertData::new();
        data.insert("AI name".into(), Value::from("ChatGPT"));
        data.insert("Total responses".into(), Value::from(3));
        data.insert("Latest response".into(), Value::from("<b>Acme</b> & co"));
        Alert {
            rule_name: "Negative sentiment surge".into(),
            message: "Negative responses are surging on ChatGPT (100.0%)".into(),
            severity: sev,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            data,
        }
    }

    #[test]
    fn subject_has_uppercase_severity() {
        assert_eq!(
            subject(&alert(Severity::High)),
            "[AI Monitor Alert] Negative sentiment surge - HIGH"
        );
    }

    #[test]
    fn plain_text_lists_rows_in_order() {
        let t = plain_text(&alert(Severity::Medium));
        assert!(t.contains("Time: 2024-05-01 12:30:00"));
        assert!(t.contains("Severity: MEDIUM"));
        let a = t.find("- AI name: ChatGPT").unwrap();
        let b = t.find("- Total responses: 3").unwrap();
        assert!(a < b);
    }

    #[test]
    fn html_uses_severity_colour_and_escapes() {
        let h = html(&alert(Severity::Critical));
        assert!(h.contains("background-color: #dc3545"));
        assert!(h.contains("&lt;b&gt;Acme&lt;/b&gt; &amp; co"));
        assert!(!h.contains("<b>Acme</b>"));
        assert!(h.contains("<tr><th>AI name</th><td>ChatGPT</td></tr>"));
    }
}
