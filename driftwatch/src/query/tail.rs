//! ログファイル末尾の読み取り
//!
//! ファイル末尾からブロック単位で後ろ向きに読み、最大 N 行を返す。
//! 読み取り中にファイルが切り詰められた（ローテーションされた）場合は
//! 新しいファイルとして読み直す。

use driftwatch_common::error::WatchResult;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::warn;

const CHUNK_SIZE: u64 = 64 * 1024;
const READ_ATTEMPTS: usize = 2;

/// 末尾ウィンドウ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailWindow {
    /// 読み取った行（古い順、改行除去済み）
    pub lines: Vec<String>,
    /// ファイル先頭まで読み切ったか
    pub reached_start: bool,
}

/// ファイル末尾から最大 `max_lines` 行を読む
///
/// ファイルが存在しない場合は空のウィンドウを返す。
pub fn read_tail(path: &Path, max_lines: usize) -> WatchResult<TailWindow> {
    if !path.exists() {
        warn!(path = %path.display(), "Log file not found");
        return Ok(TailWindow {
            lines: Vec::new(),
            reached_start: true,
        });
    }

    read_tail_with(path, max_lines, |file| Ok(file.metadata()?.len()))
}

/// `file_len` で長さを確定させてから読む
///
/// 長さ確定後に切り詰められると `read_exact` が `UnexpectedEof` になるため、
/// `READ_ATTEMPTS` 回まで開き直す。
fn read_tail_with<F>(path: &Path, max_lines: usize, mut file_len: F) -> WatchResult<TailWindow>
where
    F: FnMut(&File) -> std::io::Result<u64>,
{
    let mut attempt = 1;
    loop {
        let outcome = File::open(path).and_then(|mut file| {
            let len = file_len(&file)?;
            read_tail_once(&mut file, len, max_lines)
        });
        match outcome {
            Err(err) if err.kind() == ErrorKind::UnexpectedEof && attempt < READ_ATTEMPTS => {
                warn!(path = %path.display(), "Log file shrank while reading, re-reading");
                attempt += 1;
            }
            other => return other.map_err(Into::into),
        }
    }
}

fn read_tail_once(file: &mut File, len: u64, max_lines: usize) -> std::io::Result<TailWindow> {
    if max_lines == 0 {
        return Ok(TailWindow::default());
    }

    let mut pos = len;
    let mut buf: Vec<u8> = Vec::new();
    let mut newlines = 0usize;
    while pos > 0 && newlines <= max_lines {
        let read = CHUNK_SIZE.min(pos);
        pos -= read;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; read as usize];
        file.read_exact(&mut chunk)?;
        newlines += chunk.iter().filter(|&&b| b == b'\n').count();
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.lines().collect();
    if pos > 0 && !lines.is_empty() {
        // 先頭は途中から読んだ不完全な行
        lines.remove(0);
    }

    let reached_start = pos == 0 && lines.len() <= max_lines;
    let skip = lines.len().saturating_sub(max_lines);
    Ok(TailWindow {
        lines: lines[skip..].iter().map(|l| l.to_string()).collect(),
        reached_start,
    })
}
