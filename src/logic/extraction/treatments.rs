use super::rules::clean_span;
use crate::models::templates::pad_treatments;
use crate::models::{Tier, Treatment, MAX_TREATMENTS};
use regex_lite::Regex;
use std::sync::LazyLock;

fn pattern(src: &str) -> Regex {
    Regex::new(src).expect("Invalid treatment regex pattern")
}

/// A line opening a new treatment: `1.`, `2、`, `一、`, `方法1`, `### ...`.
static BLOCK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"^([ \t]*)(?:[-*•][ \t]*)?(?:\*\*)?(?:\d{1,2}[.、)）](?:[^\d]|$)|[一二三四五六七八九十]{1,2}[、.]|(?:方法|方案|措施)[一二三四五六七八九十\d]{1,2}|#{2,4}[ \t])",
    )
});

static MARKER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"^[ \t]*(?:[-*•][ \t]*)?(?:\*\*)?(?:\d{1,2}[.、)）]|[一二三四五六七八九十]{1,2}[、.]|(?:方法|方案|措施)[一二三四五六七八九十\d]{1,2}[:：、.]?|#{2,4})?[ \t]*",
    )
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| pattern(r"^([ \t]*)[-*•][ \t]+"));

/// Bullets naming an attribute of a treatment rather than a treatment.
static ATTRIBUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^[ \t]*[-*•]?[ \t]*\**(?:方法名称|方法|名称|成本|有效性|效果|价格|估计价格|预估价格|费用|描述|详细描述|说明|具体实施步骤|实施步骤|步骤|所需材料|材料|药剂|适用条件|最佳时机|时机|注意事项|操作注意事项|预期效果|method|cost|effectiveness|efficacy|price|description|steps?)",
    )
});

/// Attribute lines already captured into their own fields.
static CONSUMED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^[ \t]*[-*•]?[ \t]*\**(?:方法名称|成本级别|成本|有效性级别|有效性|估计价格|预估价格|价格|费用|详细描述|描述|method|cost|effectiveness|efficacy|price|description)[^\n:：]{0,12}[:：]",
    )
});

static METHOD_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?im)^[ \t*•-]*(?:\d{1,2}[.、)）][ \t*]*)?(?:方法名称|方法|method(?:[ \t]+name)?)[ \t*]*[:：][ \t*]*([^\n]+)",
    )
});

/// A line naming a treatment through its label, `- 方法名称：...`.
static METHOD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^([ \t]*)(?:[-*•][ \t]*)?\**(?:方法名称|方法|method(?:[ \t]+name)?)[ \t*]*[:：]",
    )
});

static METHOD_HEAD: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^(?:方法名称|方法|名称|method(?:[ \t]+name)?|name)$"));

/// Labels of the other requested attributes, matched against a whole head.
static ATTRIBUTE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)^(?:成本级别|成本|有效性级别|有效性|效果|估计价格|预估价格|价格|费用|详细描述|描述|说明|具体实施步骤|实施步骤|步骤|所需材料/药剂及用量|所需材料|材料|药剂|适用条件和最佳时机|适用条件|最佳时机|操作注意事项|注意事项|cost|effectiveness|efficacy|price|description|steps?)$",
    )
});

static COST_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:成本级别|成本|cost)[^\n:：]{0,12}[:：][ \t*]*(低|中|高|low|medium|high)")
});

static COST_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:成本级别|成本|cost)[ \t]*(?:为|是|is)?[ \t]*(低|中|高|low|medium|high)")
});

static COST_PREFIX: LazyLock<Regex> = LazyLock::new(|| pattern(r"(低|中|高)[ \t]*成本"));

static EFFECT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(?:有效性级别|有效性|效果|effectiveness|efficacy)[^\n:：]{0,12}[:：][ \t*]*(低|中|高|low|medium|high)",
    )
});

static EFFECT_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?i)(?:有效性级别|有效性|effectiveness|efficacy)[ \t]*(?:为|是|is)?[ \t]*(低|中|高|low|medium|high)",
    )
});

static EFFECT_PREFIX: LazyLock<Regex> = LazyLock::new(|| pattern(r"(低|中|高)[ \t]*有效"));

static PRICE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)(?:估计价格|预估价格|价格|费用|price)[^\n:：]{0,12}[:：][ \t*]*([^\n]+)")
});

static PRICE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"[¥￥$][ \t]*\d+(?:\.\d+)?(?:[ \t]*[-~～至到][ \t]*[¥￥$]?\d+(?:\.\d+)?)?(?:[ \t]*元)?(?:[ \t]*/[ \t]*[^\s，。,;；)）]+)?",
    )
});

static PRICE_YUAN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"\d+(?:\.\d+)?[ \t]*[-~～至到][ \t]*\d+(?:\.\d+)?[ \t]*元(?:[ \t]*/[ \t]*[^\s，。,;；)）]+)?",
    )
});

static DESCRIPTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?im)^[ \t*•-]*(?:详细描述|描述|说明|description)[ \t*]*[:：][ \t*]*([^\n]+)")
});

pub const DEFAULT_METHOD: &str = "喷洒杀菌剂";
pub const DEFAULT_PRICE: &str = "¥50-100/亩";
pub const DEFAULT_DESCRIPTION: &str = "对病害进行治疗";

/// Pulls treatment records out of the treatment section of a reply.
///
/// Results are padded to four entries with generic templates. The padding keeps
/// result cards uniform; it is not a claim that the model suggested them.
pub struct TreatmentExtractor;

impl TreatmentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parsed treatments followed by template padding, always four entries.
    pub fn extract_treatments(&self, section: &str) -> Vec<Treatment> {
        let mut treatments = self.parse_treatments(section);
        pad_treatments(&mut treatments);
        treatments
    }

    /// Only what the text contains: up to four, source order, first method wins.
    pub fn parse_treatments(&self, section: &str) -> Vec<Treatment> {
        let mut treatments: Vec<Treatment> = Vec::with_capacity(MAX_TREATMENTS);

        for block in split_blocks(section) {
            let Some(treatment) = parse_block(block) else {
                continue;
            };
            if treatments.iter().any(|t| t.method == treatment.method) {
                tracing::trace!(method = %treatment.method, "dropping duplicate treatment");
                continue;
            }
            treatments.push(treatment);
            if treatments.len() >= MAX_TREATMENTS {
                break;
            }
        }

        treatments
    }
}

impl Default for TreatmentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn indent_width(s: &str) -> usize {
    s.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum()
}

/// Byte offsets of every line start in `text`, paired with the line.
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split('\n')
        .map(|line| {
            let start = offset;
            offset += line.len() + 1;
            (start, line)
        })
        .collect()
}

/// Split at the given line starts. Text before the first start is dropped.
fn split_at_starts<'a>(text: &'a str, starts: &[usize]) -> Vec<&'a str> {
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            &text[start..end]
        })
        .collect()
}

/// Line starts of the least-indented lines matching `marker`, optionally filtered.
fn outermost_starts(
    lines: &[(usize, &str)],
    marker: &Regex,
    keep: impl Fn(&str) -> bool,
) -> Vec<usize> {
    let candidates: Vec<(usize, usize)> = lines
        .iter()
        .filter(|(_, line)| keep(line))
        .filter_map(|(start, line)| {
            let caps = marker.captures(line)?;
            let indent = caps.get(1).map(|m| indent_width(m.as_str())).unwrap_or(0);
            Some((*start, indent))
        })
        .collect();

    let Some(min_indent) = candidates.iter().map(|(_, i)| *i).min() else {
        return Vec::new();
    };

    candidates
        .into_iter()
        .filter(|(_, indent)| *indent == min_indent)
        .map(|(start, _)| start)
        .collect()
}

/// Candidate blocks, tried in order: explicit markers, method label lines,
/// top-level bullets that are not attribute lines, blank-line paragraphs, then
/// the whole section.
fn split_blocks(section: &str) -> Vec<&str> {
    if section.trim().is_empty() {
        return Vec::new();
    }

    let lines = lines_with_offsets(section);

    let markers = outermost_starts(&lines, &BLOCK_MARKER, |_| true);
    if !markers.is_empty() {
        return split_at_starts(section, &markers);
    }

    let method_lines = outermost_starts(&lines, &METHOD_LINE, |_| true);
    if method_lines.len() >= 2 {
        return split_at_starts(section, &method_lines);
    }

    let bullets = outermost_starts(&lines, &BULLET, |line| !ATTRIBUTE_LINE.is_match(line));
    if bullets.len() >= 2 {
        return split_at_starts(section, &bullets);
    }

    let paragraphs = paragraphs(section);
    if paragraphs.len() >= 2 {
        return paragraphs;
    }

    vec![section]
}

fn paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;

    for (offset, line) in lines_with_offsets(text) {
        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                out.push(&text[s..end]);
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = (offset + line.len()).min(text.len());
        }
    }
    if let Some(s) = start {
        out.push(&text[s..end]);
    }

    out
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Method named on the first line of a block. A `方法名称：X` line names `X`;
/// a line opening with another attribute label names nothing.
fn first_line_method(first_line: &str) -> String {
    let stripped = MARKER_PREFIX.replace(first_line, "");
    let (head, after) = stripped
        .split_once(['：', ':'])
        .unwrap_or((&*stripped, ""));
    let label = clean_span(head.split(['（', '(']).next().unwrap_or_default());

    if METHOD_HEAD.is_match(&label) {
        return clean_span(after);
    }
    if ATTRIBUTE_HEAD.is_match(&label) {
        return String::new();
    }
    label
}

fn parse_tier(text: &str, rules: [&Regex; 3]) -> Tier {
    rules
        .iter()
        .find_map(|re| capture(re, text))
        .map(Tier::from_keyword)
        .unwrap_or_default()
}

fn parse_price(text: &str) -> String {
    capture(&PRICE_LABEL, text)
        .map(clean_span)
        .filter(|p| !p.is_empty())
        .or_else(|| PRICE_RANGE.find(text).map(|m| clean_span(m.as_str())))
        .or_else(|| PRICE_YUAN.find(text).map(|m| clean_span(m.as_str())))
        .unwrap_or_else(|| DEFAULT_PRICE.to_string())
}

/// Remainder of the block once the method line and consumed attributes are removed.
fn remainder_description(first_line: &str, rest: &[&str]) -> String {
    let mut parts: Vec<String> = Vec::new();

    let stripped = MARKER_PREFIX.replace(first_line, "");
    if !CONSUMED_LINE.is_match(&stripped) {
        if let Some((_, after)) = stripped.split_once(['：', ':']) {
            let after = clean_span(after);
            if !after.is_empty() {
                parts.push(after);
            }
        }
    }

    parts.extend(
        rest.iter()
            .filter(|line| !CONSUMED_LINE.is_match(line))
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty()),
    );

    clean_span(&parts.join("\n"))
}

fn parse_block(block: &str) -> Option<Treatment> {
    let lines: Vec<&str> = block
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let (first_line, rest) = lines.split_first()?;

    let method = capture(&METHOD_LABEL, block)
        .map(clean_span)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| first_line_method(first_line));
    let method = if method.is_empty() {
        DEFAULT_METHOD.to_string()
    } else {
        method
    };

    let cost = parse_tier(block, [&*COST_LABEL, &*COST_INLINE, &*COST_PREFIX]);
    let effectiveness = parse_tier(block, [&*EFFECT_LABEL, &*EFFECT_INLINE, &*EFFECT_PREFIX]);
    let estimated_price = parse_price(block);

    let description = capture(&DESCRIPTION_LABEL, block)
        .map(clean_span)
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| remainder_description(first_line, rest));
    let description = if description.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        description
    };

    Some(Treatment::new(
        method,
        cost,
        effectiveness,
        estimated_price,
        description,
    ))
}
