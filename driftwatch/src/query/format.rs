//! 表示用HTML整形

use driftwatch_common::log::{LineBody, ParsedLine};

/// `<` `>` `&` をエスケープする
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn timestamp_span(text: &str) -> String {
    format!("<span class=\"timestamp\">{}</span>", escape_html(text))
}

/// パース済み行を表示用HTMLに整形する
///
/// タイムスタンプのない行や本体を解釈できなかった行は、行全体をエスケープして返す。
pub fn format_line(line: &ParsedLine) -> String {
    let Some(ts) = line.timestamp_text.as_deref() else {
        return escape_html(line.raw.trim());
    };

    match &line.body {
        LineBody::Message { message, .. } => {
            let level = line.level_token.as_deref().unwrap_or("UNKNOWN");
            format!(
                "{} - <span class=\"log-{}\">{}</span> - {}",
                timestamp_span(ts),
                escape_html(&level.to_ascii_lowercase()),
                escape_html(level),
                escape_html(message)
            )
        }
        LineBody::Metric(fields) => {
            let mut out = format!(
                "{} - <span class=\"log-info\">{}</span>: <strong>{}</strong>",
                timestamp_span(ts),
                escape_html(&fields.metric),
                escape_html(&fields.value_text())
            );
            let tags = fields.tags_text();
            if !tags.is_empty() {
                out.push_str(&format!(" [{}]", escape_html(&tags)));
            }
            out
        }
        LineBody::Raw(_) => escape_html(line.raw.trim()),
    }
}
