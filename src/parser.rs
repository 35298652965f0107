//! Recovery of structured fields from generated translation text.
//!
//! The generation service answers in free-form text that follows one of a
//! few section templates, depending on which prompt produced it. Each
//! template gets its own detector; detectors are tried in order and the
//! first one that recognises the text decides how it is split. Text no
//! detector recognises is passed through as a single block.

/// Keywords that mark bilingual-variant output ("Format A").
const VARIANT_KEYWORDS: &[&str] = &["翻譯一", "翻譯二", "詞句詳細解說", "## ", "翻譯 (", "翻譯（"];

/// Explanation-section markers for variant output, in priority order.
const VARIANT_SPLIT_MARKERS: &[&str] = &["## 詞句詳細解說", "詞句詳細解說", "## "];

/// Lines that open a translation variant.
const VARIANT_START_MARKERS: &[&str] = &["翻譯一", "翻譯二"];

/// Label of the echoed source text, skipped inside the translation section.
const ORIGINAL_TEXT_LABEL: &str = "原文：";

/// Section headers of tone-analysis output ("Format B").
const ANALYSIS_KEYWORDS: &[&str] = &["語氣分析", "整句話的意思"];

/// Header that opens the word-by-word breakdown in tone-analysis output.
const ANALYSIS_SPLIT_MARKER: &str = "逐字拆解";

/// Explanations at or under this many characters are dropped.
pub const DEFAULT_MIN_EXPLANATION_CHARS: usize = 10;

/// A translation split into display fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTranslation {
    /// Output with no recognised structure.
    Unstructured { text: String },
    /// Output split into the translation proper and its notes.
    Structured {
        translation: String,
        explanation: Option<String>,
    },
}

impl ParsedTranslation {
    /// The translation text to show first.
    pub fn translation(&self) -> &str {
        match self {
            ParsedTranslation::Unstructured { text } => text,
            ParsedTranslation::Structured { translation, .. } => translation,
        }
    }

    /// Explanatory notes, if the output carried any.
    pub fn explanation(&self) -> Option<&str> {
        match self {
            ParsedTranslation::Unstructured { .. } => None,
            ParsedTranslation::Structured { explanation, .. } => explanation.as_deref(),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ParsedTranslation::Structured { .. })
    }
}

/// Tries to split raw output; returns `None` if the text is not in its format.
pub type FormatDetector = fn(&str, usize) -> Option<ParsedTranslation>;

/// Parser for generated translation output.
///
/// Sections are returned untruncated; display limits belong to the caller.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    min_explanation_chars: usize,
    detectors: Vec<FormatDetector>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_EXPLANATION_CHARS)
    }
}

impl ResponseParser {
    /// Creates a parser with the built-in formats.
    pub fn new(min_explanation_chars: usize) -> Self {
        Self {
            min_explanation_chars,
            detectors: vec![detect_analysis_format, detect_variant_format],
        }
    }

    /// Adds a detector tried after the built-in ones.
    pub fn with_detector(mut self, detector: FormatDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Parses raw generated text.
    pub fn parse(&self, raw: &str) -> ParsedTranslation {
        self.detectors
            .iter()
            .find_map(|detect| detect(raw, self.min_explanation_chars))
            .unwrap_or_else(|| ParsedTranslation::Unstructured {
                text: raw.to_string(),
            })
    }
}

/// Keeps an explanation only if it is longer than the threshold.
fn keep_explanation(after: &str, min_chars: usize) -> Option<String> {
    let after = after.trim();
    (after.chars().count() > min_chars).then(|| after.to_string())
}

fn is_variant_start(line: &str) -> bool {
    VARIANT_START_MARKERS.iter().any(|m| line.contains(m))
        && (line.contains('(') || line.contains('（'))
}

/// Detector for "翻譯一 (…) / 翻譯二 (…) / ## 詞句詳細解說" output.
fn detect_variant_format(raw: &str, min_explanation_chars: usize) -> Option<ParsedTranslation> {
    if !VARIANT_KEYWORDS.iter().any(|k| raw.contains(k)) {
        return None;
    }

    let (before, after) = VARIANT_SPLIT_MARKERS
        .iter()
        .find_map(|marker| raw.split_once(marker))
        .map(|(b, a)| (b.trim(), a.trim()))
        .unwrap_or((raw.trim(), ""));

    let mut collected: Vec<&str> = Vec::new();
    let mut collecting = false;
    for line in before.lines() {
        let trimmed = line.trim();
        if trimmed.contains(ORIGINAL_TEXT_LABEL) {
            continue;
        }
        if is_variant_start(trimmed) {
            collecting = true;
            collected.push(line);
        } else if collecting && !trimmed.is_empty() {
            collected.push(line);
        }
    }

    let translation = if collected.is_empty() {
        before.to_string()
    } else {
        collected.join("\n").trim().to_string()
    };

    // Output that opens with the split marker has nothing before it; the
    // translation must never repeat the marker, so keep the text whole.
    if translation.is_empty() {
        return None;
    }

    Some(ParsedTranslation::Structured {
        translation,
        explanation: keep_explanation(after, min_explanation_chars),
    })
}

/// Detector for "語氣分析 / 整句話的意思 / … / 逐字拆解 / 文化背景說明" output.
///
/// Everything above the breakdown header is the translation; the header
/// line itself is consumed and the rest becomes the explanation.
fn detect_analysis_format(raw: &str, min_explanation_chars: usize) -> Option<ParsedTranslation> {
    if !ANALYSIS_KEYWORDS.iter().any(|k| raw.contains(k)) {
        return None;
    }

    let lines: Vec<&str> = raw.lines().collect();
    let header = lines
        .iter()
        .position(|line| line.contains(ANALYSIS_SPLIT_MARKER))?;

    let translation = lines[..header].join("\n").trim().to_string();
    if translation.is_empty() {
        return None;
    }
    let after = lines[header + 1..].join("\n");

    Some(ParsedTranslation::Structured {
        translation,
        explanation: keep_explanation(&after, min_explanation_chars),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANT_OUTPUT: &str = "原文：\nสวัสดี\n\n翻譯一 (直接翻譯)：「A」\n翻譯二 (最自然)：「你好呀」\n\n## 詞句詳細解說\nB：สวัสดี 是泰文最常見的問候語，男女通用。";

    #[test]
    fn test_variant_format_split() {
        let parsed = ResponseParser::default().parse(VARIANT_OUTPUT);
        let ParsedTranslation::Structured {
            translation,
            explanation,
        } = parsed
        else {
            panic!("expected structured output");
        };

        assert!(translation.contains("A"));
        assert!(translation.starts_with("翻譯一"));
        assert!(!translation.contains("原文："));
        assert!(!translation.contains("## 詞句詳細解說"));

        let explanation = explanation.unwrap();
        assert!(explanation.contains("B"));
        assert!(!explanation.contains("## 詞句詳細解說"));
    }

    #[test]
    fn test_short_explanation_dropped() {
        let raw = "翻譯一 (直接翻譯)：「A」\n## 詞句詳細解說\nB";
        let parsed = ResponseParser::default().parse(raw);
        assert!(parsed.is_structured());
        assert_eq!(parsed.explanation(), None);

        let parsed = ResponseParser::new(0).parse(raw);
        assert_eq!(parsed.explanation(), Some("B"));
    }

    #[test]
    fn test_generic_header_split() {
        let raw = "翻譯 (口語)：今天天氣很好\n## 備註\n這句話常用在打招呼的時候，語氣輕鬆。";
        let parsed = ResponseParser::default().parse(raw);
        assert_eq!(parsed.translation(), "翻譯 (口語)：今天天氣很好");
        assert!(parsed.explanation().unwrap().starts_with("備註"));
    }

    #[test]
    fn test_no_variant_lines_falls_back_to_section() {
        let raw = "今天天氣很好\n## 詞句詳細解說\n天氣：weather，這裡指今天的天候狀況。";
        let parsed = ResponseParser::default().parse(raw);
        assert_eq!(parsed.translation(), "今天天氣很好");
        assert!(parsed.explanation().is_some());
    }

    #[test]
    fn test_marker_at_start_stays_whole() {
        let raw = "## 詞句詳細解說\n沒有翻譯，只有解說內容的奇怪輸出。";
        let parsed = ResponseParser::default().parse(raw);
        assert_eq!(
            parsed,
            ParsedTranslation::Unstructured {
                text: raw.to_string()
            }
        );
    }

    #[test]
    fn test_plain_text_is_unstructured() {
        let raw = "今天天氣很好，我們去海邊吧！";
        let parsed = ResponseParser::default().parse(raw);
        assert_eq!(parsed.translation(), raw);
        assert!(!parsed.is_structured());
    }

    #[test]
    fn test_analysis_format_split() {
        let raw = "**語氣分析：**\n開心、撒嬌\n\n**整句話的意思：**\n「我好想你」\n\n**翻成自然且符合台灣情境的繁體中文：**\n「好想你喔～」\n\n**逐字拆解泰文：**\nคิดถึง (kít-thǔeng)：想念\n\n**文化背景說明：**\n粉絲常用的撒嬌說法。";
        let parsed = ResponseParser::default().parse(raw);

        let translation = parsed.translation();
        assert!(translation.contains("好想你喔～"));
        assert!(!translation.contains(ANALYSIS_SPLIT_MARKER));

        let explanation = parsed.explanation().unwrap();
        assert!(explanation.contains("kít-thǔeng"));
        assert!(explanation.contains("文化背景說明"));
        assert!(!explanation.contains(ANALYSIS_SPLIT_MARKER));
    }

    #[test]
    fn test_analysis_without_breakdown_is_unstructured() {
        let raw = "**語氣分析：**\n平淡\n\n**整句話的意思：**\n「早安」";
        let parsed = ResponseParser::default().parse(raw);
        assert!(!parsed.is_structured());
    }

    #[test]
    fn test_custom_detector() {
        fn detect_pipe(raw: &str, _: usize) -> Option<ParsedTranslation> {
            let (t, e) = raw.split_once(" || ")?;
            Some(ParsedTranslation::Structured {
                translation: t.to_string(),
                explanation: Some(e.to_string()),
            })
        }

        let parser = ResponseParser::default().with_detector(detect_pipe);
        let parsed = parser.parse("hello || greeting");
        assert_eq!(parsed.translation(), "hello");
        assert_eq!(parsed.explanation(), Some("greeting"));
    }
}
