//! ステータスページ出力
//!
//! 各ターゲットのドキュメントルート（`{sites_dir}/{host}/index.html`）に
//! 期待文字列と時刻情報を含むページを書き出す。プローブはこのページを取得する。

use chrono::{DateTime, FixedOffset};
use driftwatch_common::error::WatchResult;
use driftwatch_common::types::{ReferenceTime, Target};
use std::path::PathBuf;

/// ステータスページライター
#[derive(Debug, Clone)]
pub struct StatusPageWriter {
    sites_dir: PathBuf,
    timezone: String,
}

impl StatusPageWriter {
    /// 新しいライターを作成
    pub fn new(sites_dir: impl Into<PathBuf>, timezone: impl Into<String>) -> Self {
        Self {
            sites_dir: sites_dir.into(),
            timezone: timezone.into(),
        }
    }

    /// ターゲットのページパス
    pub fn page_path(&self, target: &Target) -> PathBuf {
        self.sites_dir.join(&target.host).join("index.html")
    }

    /// ページを書き出す
    pub async fn write(
        &self,
        target: &Target,
        reference: &ReferenceTime,
        local_time: DateTime<FixedOffset>,
    ) -> WatchResult<PathBuf> {
        let path = self.page_path(target);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = render(target, reference, local_time, &self.timezone);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// ページ本文を生成する
pub fn render(
    target: &Target,
    reference: &ReferenceTime,
    local_time: DateTime<FixedOffset>,
    timezone: &str,
) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: system-ui; max-width: 680px; margin: 40px auto;">
  <h1>{title}</h1>
  <p><strong>Container:</strong> {container}</p>
  <p><strong>Fetched time ({timezone}, {provenance}):</strong> {fetched}</p>
  <p><strong>Local time (container):</strong> {local}</p>
  <p>This page is updated by the watchdog.</p>
</body>
</html>
"#,
        title = target.expected_text,
        container = escape(target.container_id()),
        timezone = escape(timezone),
        provenance = reference.provenance,
        fetched = reference.instant.to_rfc3339(),
        local = local_time.to_rfc3339(),
    )
}
