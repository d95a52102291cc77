//! ログフィルタ
//!
//! 時間範囲 → 検索パターン → レベル の順で判定する。各判定は独立した述語で、
//! 指定されたものはすべて満たす必要がある（AND）。

use chrono::{DateTime, Local, NaiveDateTime};
use driftwatch_common::log::{parse_line, LogGrammar, LogLevel, ParsedLine};
use regex::{Regex, RegexBuilder};

/// レベル継承済みのログエントリ
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// パース結果
    pub parsed: ParsedLine,
    /// 実効レベル
    ///
    /// タイムスタンプのない継続行（スタックトレース等）は直前の構造化行の
    /// レベルを引き継ぐ。
    pub effective_level: Option<LogLevel>,
}

/// 行をパースし、継続行にレベルを引き継ぐ
pub fn annotate<I, S>(lines: I, grammar: LogGrammar) -> Vec<LogEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut current: Option<LogLevel> = None;
    lines
        .into_iter()
        .map(|line| {
            let parsed = parse_line(line.as_ref(), grammar);
            if parsed.timestamp.is_some() {
                current = parsed.level.clone();
            }
            let effective_level = if parsed.timestamp.is_some() {
                parsed.level.clone()
            } else {
                current.clone()
            };
            LogEntry {
                parsed,
                effective_level,
            }
        })
        .collect()
}

/// レベルフィルタ
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LevelFilter {
    /// 全レベル
    #[default]
    All,
    /// 指定レベルのみ
    Only(LogLevel),
}

impl LevelFilter {
    /// `ALL` / `ERROR` / `WARNING` / `INFO` / `DEBUG` などを解釈する
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("ALL") {
            LevelFilter::All
        } else {
            LevelFilter::Only(LogLevel::from_token(trimmed))
        }
    }

    /// 表示名
    pub fn as_str(&self) -> &str {
        match self {
            LevelFilter::All => "ALL",
            LevelFilter::Only(level) => level.as_str(),
        }
    }

    fn matches(&self, level: Option<&LogLevel>) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Only(wanted) => level == Some(wanted),
        }
    }
}

/// 検索パターン
#[derive(Debug, Clone)]
pub enum SearchPattern {
    /// 正規表現
    Regex(Regex),
    /// 正規表現として解釈できなかった場合の部分文字列検索
    Literal {
        /// 検索文字列（大文字小文字を区別しない場合は小文字化済み）
        needle: String,
        /// 大文字小文字を区別するか
        case_sensitive: bool,
    },
}

impl SearchPattern {
    /// パターンをコンパイルする
    ///
    /// 不正な正規表現はエラーにせず部分文字列検索に切り替え、警告文を返す。
    pub fn compile(pattern: &str, case_sensitive: bool) -> (Self, Option<String>) {
        match RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
        {
            Ok(regex) => (SearchPattern::Regex(regex), None),
            Err(_) => {
                let needle = if case_sensitive {
                    pattern.to_string()
                } else {
                    pattern.to_lowercase()
                };
                let warning = format!("Invalid regex '{}', using literal search instead", pattern);
                (
                    SearchPattern::Literal {
                        needle,
                        case_sensitive,
                    },
                    Some(warning),
                )
            }
        }
    }

    /// 行が一致するか
    pub fn is_match(&self, line: &str) -> bool {
        match self {
            SearchPattern::Regex(regex) => regex.is_match(line),
            SearchPattern::Literal {
                needle,
                case_sensitive: true,
            } => line.contains(needle.as_str()),
            SearchPattern::Literal { needle, .. } => line.to_lowercase().contains(needle.as_str()),
        }
    }
}

/// フィルタ条件
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    /// レベル
    pub level: LevelFilter,
    /// 開始時刻（含む）
    pub time_start: Option<NaiveDateTime>,
    /// 終了時刻（含む）
    pub time_end: Option<NaiveDateTime>,
    /// 検索パターン
    pub search: Option<SearchPattern>,
    /// 組み立て時の警告（不正な正規表現・時刻など）
    pub warnings: Vec<String>,
}

impl FilterSpec {
    /// レベルのみ指定した条件
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// 時間範囲を設定する
    pub fn with_time_range(
        mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        self.time_start = start;
        self.time_end = end;
        self
    }

    /// 文字列の時間範囲を設定する
    ///
    /// 解釈できない境界は無視し、警告に記録する。
    pub fn with_time_bounds(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.time_start = self.bound("start", start);
        self.time_end = self.bound("end", end);
        self
    }

    fn bound(&mut self, name: &str, text: Option<&str>) -> Option<NaiveDateTime> {
        let text = text.map(str::trim).filter(|t| !t.is_empty())?;
        match parse_time_bound(text) {
            Some(value) => Some(value),
            None => {
                self.warnings
                    .push(format!("Ignoring unparseable {} time '{}'", name, text));
                None
            }
        }
    }

    /// 検索パターンを設定する（空文字列は無視）
    pub fn with_search(mut self, pattern: Option<&str>, case_sensitive: bool) -> Self {
        self.search = match pattern.filter(|p| !p.is_empty()) {
            Some(pattern) => {
                let (compiled, warning) = SearchPattern::compile(pattern, case_sensitive);
                self.warnings.extend(warning);
                Some(compiled)
            }
            None => None,
        };
        self
    }

    fn has_time_range(&self) -> bool {
        self.time_start.is_some() || self.time_end.is_some()
    }

    /// エントリが条件を満たすか
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if self.has_time_range() {
            let Some(ts) = entry.parsed.timestamp else {
                return false;
            };
            if self.time_start.is_some_and(|start| ts < start) {
                return false;
            }
            if self.time_end.is_some_and(|end| ts > end) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            if !search.is_match(&entry.parsed.raw) {
                return false;
            }
        }

        self.level.matches(entry.effective_level.as_ref())
    }

    /// 条件を満たす非空行を返す
    pub fn apply(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        entries
            .into_iter()
            .filter(|entry| !entry.parsed.is_blank() && self.matches(entry))
            .collect()
    }
}

/// 時間範囲の境界をパースする
///
/// RFC 3339（オフセットはローカル時刻へ変換）、`YYYY-MM-DDTHH:MM[:SS[.fff]]`、
/// `YYYY-MM-DD HH:MM:SS`、ログ書式の `YYYY-MM-DD HH:MM:SS,mmm` を受け付ける。
pub fn parse_time_bound(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.with_timezone(&Local).naive_local());
    }
    if let Some(ts) = driftwatch_common::log::parse_timestamp(text) {
        return Some(ts);
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const SAMPLE: &[&str] = &[
        "2025-09-02 01:00:00,000 - watchdog - INFO - cycle started",
        "2025-09-02 01:00:01,000 - watchdog - ERROR - Exception while checking web1:80",
        "Traceback (most recent call last):",
        "  File \"watchdog.py\", line 241, in main_loop",
        "2025-09-02 01:00:02,000 - watchdog - WARN - World time fetch failed",
        "",
        "2025-09-02 02:30:00,000 - watchdog - DEBUG - sleeping 60s",
        "2025-09-02 03:00:00,000 - watchdog - INFO - Validation PASS for web2:80",
    ];

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn entries() -> Vec<LogEntry> {
        annotate(SAMPLE.iter().copied(), LogGrammar::Application)
    }

    fn raws(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.parsed.raw.as_str()).collect()
    }

    #[test]
    fn continuation_lines_inherit_level() {
        let entries = entries();
        assert_eq!(entries[2].effective_level, Some(LogLevel::Error));
        assert_eq!(entries[3].effective_level, Some(LogLevel::Error));
        assert_eq!(entries[2].parsed.level, None);
    }

    #[test]
    fn lines_before_first_entry_have_no_level() {
        let entries = annotate(
            ["orphan", "2025-09-02 01:00:00,000 - w - INFO - x"],
            LogGrammar::Application,
        );
        assert_eq!(entries[0].effective_level, None);
        let filtered = FilterSpec::new(LevelFilter::parse("INFO")).apply(entries);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn level_filter_keeps_traceback_with_error() {
        let filtered = FilterSpec::new(LevelFilter::parse("error")).apply(entries());
        assert_eq!(raws(&filtered), vec![SAMPLE[1], SAMPLE[2], SAMPLE[3]]);
    }

    #[test]
    fn warn_and_warning_are_the_same_filter() {
        let a = FilterSpec::new(LevelFilter::parse("WARN")).apply(entries());
        let b = FilterSpec::new(LevelFilter::parse("WARNING")).apply(entries());
        assert_eq!(a, b);
        assert_eq!(raws(&a), vec![SAMPLE[4]]);
    }

    #[test]
    fn all_filter_drops_only_blank_lines() {
        let filtered = FilterSpec::default().apply(entries());
        assert_eq!(filtered.len(), SAMPLE.len() - 1);
    }

    #[test]
    fn time_range_is_inclusive_and_excludes_continuations() {
        let filtered = FilterSpec::default()
            .with_time_range(Some(ts(1, 0, 1)), Some(ts(2, 30, 0)))
            .apply(entries());
        assert_eq!(raws(&filtered), vec![SAMPLE[1], SAMPLE[4], SAMPLE[6]]);
    }

    #[test]
    fn open_ended_time_range() {
        let filtered = FilterSpec::default()
            .with_time_range(Some(ts(2, 0, 0)), None)
            .apply(entries());
        assert_eq!(raws(&filtered), vec![SAMPLE[6], SAMPLE[7]]);
    }

    #[test]
    fn regex_search_is_case_insensitive_by_default() {
        let filtered = FilterSpec::default()
            .with_search(Some("web[12]:80"), false)
            .apply(entries());
        assert_eq!(raws(&filtered), vec![SAMPLE[1], SAMPLE[7]]);

        let filtered = FilterSpec::default()
            .with_search(Some("TRACEBACK"), false)
            .apply(entries());
        assert_eq!(filtered.len(), 1);

        let filtered = FilterSpec::default()
            .with_search(Some("TRACEBACK"), true)
            .apply(entries());
        assert!(filtered.is_empty());
    }

    #[test]
    fn invalid_regex_falls_back_to_literal() {
        let spec = FilterSpec::default().with_search(Some("main_loop("), false);
        assert!(matches!(spec.search, Some(SearchPattern::Literal { .. })));
        assert_eq!(spec.warnings.len(), 1);
        assert!(spec.warnings[0].contains("main_loop("));

        let lines = ["2025-09-02 01:00:00,000 - w - ERROR - crashed in MAIN_LOOP(x)"];
        let filtered = spec.apply(annotate(lines, LogGrammar::Application));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn filters_combine_with_and() {
        let filtered = FilterSpec::new(LevelFilter::parse("INFO"))
            .with_time_range(Some(ts(2, 0, 0)), None)
            .with_search(Some("PASS"), true)
            .apply(entries());
        assert_eq!(raws(&filtered), vec![SAMPLE[7]]);
    }

    #[test]
    fn empty_search_is_ignored() {
        let spec = FilterSpec::default().with_search(Some(""), false);
        assert!(spec.search.is_none());
        assert!(spec.warnings.is_empty());
    }

    #[test]
    fn unparseable_bound_is_reported_and_ignored() {
        let spec = FilterSpec::default()
            .with_time_bounds(Some("yesterday"), Some("2025-09-02T02:00"));
        assert_eq!(spec.time_start, None);
        assert_eq!(spec.time_end, Some(ts(2, 0, 0)));
        assert_eq!(spec.warnings.len(), 1);
    }

    #[test]
    fn parses_time_bound_variants() {
        assert_eq!(parse_time_bound("2025-09-02T01:58"), Some(ts(1, 58, 0)));
        assert_eq!(parse_time_bound("2025-09-02T01:58:16"), Some(ts(1, 58, 16)));
        assert_eq!(parse_time_bound("2025-09-02 01:58:16"), Some(ts(1, 58, 16)));
        assert_eq!(
            parse_time_bound("2025-09-02 01:58:16,550"),
            NaiveDate::from_ymd_opt(2025, 9, 2)
                .unwrap()
                .and_hms_milli_opt(1, 58, 16, 550)
        );
        assert!(parse_time_bound("2025-09-02T01:58:16+00:00").is_some());
        assert_eq!(parse_time_bound("02/09/2025"), None);
    }

    fn arb_level() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("INFO"),
            Just("ERROR"),
            Just("WARNING"),
            Just("WARN"),
            Just("DEBUG"),
            Just("TRACE"),
        ]
    }

    fn arb_line() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..24, 0u32..60, arb_level(), "[a-z ()]{0,12}")
                .prop_map(|(h, m, level, msg)| format!(
                    "2025-09-02 {h:02}:{m:02}:00,000 - watchdog - {level} - {msg}"
                )),
            "[ a-zA-Z()]{0,16}",
        ]
    }

    proptest! {
        #[test]
        fn level_filter_is_idempotent(
            lines in prop::collection::vec(arb_line(), 0..40),
            level in prop_oneof![Just("ERROR"), Just("WARNING"), Just("INFO"), Just("DEBUG")],
        ) {
            let spec = FilterSpec::new(LevelFilter::parse(level));
            let once = spec.apply(annotate(&lines, LogGrammar::Application));
            let twice = spec.apply(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn widening_time_range_never_removes_lines(
            lines in prop::collection::vec(arb_line(), 0..40),
            a in 0u32..24, b in 0u32..24, widen_start in 0u32..5, widen_end in 0u32..5,
        ) {
            let (lo, hi) = (a.min(b), a.max(b));
            let narrow = FilterSpec::default()
                .with_time_range(Some(ts(lo, 0, 0)), Some(ts(hi, 0, 0)))
                .apply(annotate(&lines, LogGrammar::Application));
            let wide = FilterSpec::default()
                .with_time_range(
                    Some(ts(lo.saturating_sub(widen_start), 0, 0)),
                    Some(ts((hi + widen_end).min(23), 59, 59)),
                )
                .apply(annotate(&lines, LogGrammar::Application));
            for entry in &narrow {
                prop_assert!(wide.contains(entry));
            }
        }

        #[test]
        fn invalid_patterns_never_panic(pattern in "[(\\[{*+?a-z]{1,8}", case_sensitive: bool) {
            let spec = FilterSpec::default().with_search(Some(&pattern), case_sensitive);
            let _ = spec.apply(annotate(SAMPLE.iter().copied(), LogGrammar::Application));
        }
    }
}
