use super::FieldRule;
use regex_lite::Regex;
use std::sync::LazyLock;

fn pattern(src: &str) -> Regex {
    Regex::new(src).expect("Invalid extraction regex pattern")
}

// --- disease name ---

pub static NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?:病害名称|疾病名称|病害|诊断结果)[ \t*]*[:：][ \t*]*([^\n]+)")
});

pub static NAME_LABEL_EN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?im)^[ \t*#>\d.、-]*(?:disease[ \t]+)?name[ \t*]*[:：][ \t*]*([^\n]+)")
});

pub static NAME_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?m)^[ \t]*1[.、][ \t]*([^\n]+)"));

// --- description ---

pub static DESCRIPTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?:病害描述|症状描述|病情描述)[^\n:：]{0,30}[:：][ \t*]*")
});

pub static DESCRIPTION_LABEL_EN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)description[ \t*]*[:：][ \t*]*"));

pub static DESCRIPTION_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?m)^[ \t]*2[.、][ \t]*"));

/// Where a description span ends: the next numbered item or a confidence/treatment label.
pub static SPAN_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?im)^[ \t*#>-]*(?:\d+[.、]|置信度|可信度|治疗方案|治疗方法|防治方案|防治方法|防治措施|confidence|treatments?)",
    )
});

// --- confidence ---

pub static CONFIDENCE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:置信度|可信度|confidence)[^\n:：]{0,30}[:：][ \t*]*(-?\d+(?:\.\d+)?)[ \t]*(%?)")
});

pub static CONFIDENCE_ADJACENT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:置信度|可信度|confidence)[^\d\n-]{0,12}(-?\d+(?:\.\d+)?)[ \t]*(%?)")
});

pub static CONFIDENCE_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?m)^[ \t]*3[.、][^\d\n-]{0,12}(-?\d+(?:\.\d+)?)[ \t]*(%?)")
});

// --- treatment section ---

pub static SECTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?im)^[ \t*#>\d.、-]*(?:治疗方案|治疗方法|防治方案|防治方法|防治措施|治疗建议|(?:recommended[ \t]+)?treatments?)[^\n:：]{0,30}[:：][ \t*]*",
    )
});

pub static SECTION_NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?m)^[ \t]*4[.、][ \t]*"));

/// Trim whitespace and markdown decoration from both ends of a span.
pub fn clean_span(s: &str) -> String {
    s.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '*' | '#' | '`' | '"' | '“' | '”' | '「' | '」')
    })
    .to_string()
}

/// First capture group on a single line.
pub struct LineCapture {
    id: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl LineCapture {
    pub const fn new(id: &'static str, pattern: &'static LazyLock<Regex>) -> Self {
        Self { id, pattern }
    }
}

impl FieldRule<String> for LineCapture {
    fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, text: &str) -> Option<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| clean_span(m.as_str())))
            .find(|span| !span.is_empty())
    }
}

/// Text after a start label, up to the next section boundary.
pub struct BoundedSpan {
    id: &'static str,
    start: &'static LazyLock<Regex>,
}

impl BoundedSpan {
    pub const fn new(id: &'static str, start: &'static LazyLock<Regex>) -> Self {
        Self { id, start }
    }
}

impl FieldRule<String> for BoundedSpan {
    fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, text: &str) -> Option<String> {
        self.start
            .find_iter(text)
            .map(|m| {
                let end = SPAN_BOUNDARY
                    .find_at(text, m.end())
                    .map(|b| b.start())
                    .unwrap_or(text.len());
                clean_span(&text[m.end()..end])
            })
            .find(|span| !span.is_empty())
    }
}

/// A confidence number exactly as written, before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawConfidence {
    pub value: f64,
    pub percent: bool,
}

pub struct ConfidenceCapture {
    id: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl ConfidenceCapture {
    pub const fn new(id: &'static str, pattern: &'static LazyLock<Regex>) -> Self {
        Self { id, pattern }
    }
}

impl FieldRule<RawConfidence> for ConfidenceCapture {
    fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, text: &str) -> Option<RawConfidence> {
        self.pattern.captures_iter(text).find_map(|caps| {
            let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
            let percent = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
            Some(RawConfidence { value, percent })
        })
    }
}

/// Byte offsets of the treatment section within a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    /// Start of the label introducing the section
    pub marker: usize,
    /// Start of the section body
    pub body: usize,
    /// Whether everything before `marker` can be treated as the non-treatment part
    pub bounds_head: bool,
}

pub struct SectionStart {
    id: &'static str,
    pattern: &'static LazyLock<Regex>,
}

impl SectionStart {
    pub const fn new(id: &'static str, pattern: &'static LazyLock<Regex>) -> Self {
        Self { id, pattern }
    }
}

impl FieldRule<SectionSpan> for SectionStart {
    fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, text: &str) -> Option<SectionSpan> {
        self.pattern.find(text).map(|m| SectionSpan {
            marker: m.start(),
            body: m.end(),
            bounds_head: true,
        })
    }
}

/// Last resort: the section starts at the first occurrence of a keyword.
pub struct KeywordStart {
    id: &'static str,
    keyword: &'static str,
}

impl KeywordStart {
    pub const fn new(id: &'static str, keyword: &'static str) -> Self {
        Self { id, keyword }
    }
}

impl FieldRule<SectionSpan> for KeywordStart {
    fn id(&self) -> &'static str {
        self.id
    }

    fn apply(&self, text: &str) -> Option<SectionSpan> {
        text.find(self.keyword).map(|i| SectionSpan {
            marker: i,
            body: i,
            bounds_head: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_span_strips_markdown() {
        assert_eq!(clean_span("  **稻瘟病**  "), "稻瘟病");
        assert_eq!(clean_span("### Rice blast\n"), "Rice blast");
        assert_eq!(clean_span("\u{3000}白粉病\u{3000}"), "白粉病");
    }

    #[test]
    fn name_label_rule() {
        let rule = LineCapture::new("name_label", &NAME_LABEL);
        assert_eq!(rule.apply("病害名称：稻瘟病\n其他").as_deref(), Some("稻瘟病"));
        assert_eq!(rule.apply("**病害名称**: 白粉病").as_deref(), Some("白粉病"));
        assert_eq!(rule.apply("病害描述：叶片发黄"), None);
    }

    #[test]
    fn english_name_rule() {
        let rule = LineCapture::new("name_label_en", &NAME_LABEL_EN);
        assert_eq!(
            rule.apply("1. Disease name: Powdery mildew\n").as_deref(),
            Some("Powdery mildew")
        );
        assert_eq!(rule.apply("Name: Leaf spot").as_deref(), Some("Leaf spot"));
        assert_eq!(rule.apply("The plant name is unclear"), None);
    }

    #[test]
    fn numbered_name_rule_skips_empty_items() {
        let rule = LineCapture::new("name_numbered", &NAME_NUMBERED);
        assert_eq!(rule.apply("1. 稻瘟病\n2. 描述").as_deref(), Some("稻瘟病"));
        assert_eq!(rule.apply("1、锈病").as_deref(), Some("锈病"));
        assert_eq!(rule.apply("2. 描述"), None);
    }

    #[test]
    fn bounded_span_stops_at_next_section() {
        let rule = BoundedSpan::new("description_label", &DESCRIPTION_LABEL);
        let text = "病害描述：叶片出现褐色病斑，\n逐渐扩大。\n置信度：0.8";
        assert_eq!(
            rule.apply(text).as_deref(),
            Some("叶片出现褐色病斑，\n逐渐扩大。")
        );
    }

    #[test]
    fn bounded_span_stops_at_numbered_item() {
        let rule = BoundedSpan::new("description_numbered", &DESCRIPTION_NUMBERED);
        let text = "1. 锈病\n2. 叶片有锈色孢子堆\n3. 0.9";
        assert_eq!(rule.apply(text).as_deref(), Some("叶片有锈色孢子堆"));
    }

    #[test]
    fn bounded_span_runs_to_end_without_boundary() {
        let rule = BoundedSpan::new("description_label_en", &DESCRIPTION_LABEL_EN);
        assert_eq!(
            rule.apply("Description: white powder on leaves").as_deref(),
            Some("white powder on leaves")
        );
    }

    #[test]
    fn confidence_label_prefers_value_after_colon() {
        let rule = ConfidenceCapture::new("confidence_label", &CONFIDENCE_LABEL);
        let raw = rule.apply("置信度(0-1之间的数值)：0.85").unwrap();
        assert_eq!(raw.value, 0.85);
        assert!(!raw.percent);

        let raw = rule.apply("Confidence: 92%").unwrap();
        assert_eq!(raw.value, 92.0);
        assert!(raw.percent);
    }

    #[test]
    fn confidence_adjacent_and_numbered() {
        let adjacent = ConfidenceCapture::new("confidence_adjacent", &CONFIDENCE_ADJACENT);
        assert_eq!(adjacent.apply("置信度约为 0.6").unwrap().value, 0.6);

        let numbered = ConfidenceCapture::new("confidence_numbered", &CONFIDENCE_NUMBERED);
        assert_eq!(numbered.apply("1. a\n2. b\n3. 0.75\n").unwrap().value, 0.75);
        assert_eq!(numbered.apply("3. 置信度 -0.2").unwrap().value, -0.2);
    }

    #[test]
    fn section_label_variants() {
        let rule = SectionStart::new("section_label", &SECTION_LABEL);
        let text = "置信度：0.8\n4. 治疗方案(包括方法)：\n1. 喷药";
        let span = rule.apply(text).unwrap();
        assert_eq!(&text[span.body..], "\n1. 喷药");
        assert_eq!(&text[span.marker..span.marker + 2], "4.");
        assert!(span.bounds_head);

        assert!(rule.apply("Treatments:\n- prune").is_some());
        assert!(rule.apply("建议及时治疗").is_none());
    }

    #[test]
    fn keyword_start_keeps_keyword() {
        let rule = KeywordStart::new("section_keyword", "治疗");
        let text = "叶斑病。治疗可用杀菌剂";
        let span = rule.apply(text).unwrap();
        assert_eq!(&text[span.body..], "治疗可用杀菌剂");
        assert!(!span.bounds_head);
    }
}
