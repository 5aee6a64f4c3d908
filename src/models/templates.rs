//! Generic treatment templates.
//!
//! Padding a diagnosis up to four treatments is a presentation normalization so
//! every result renders the same number of cards. A padded entry says nothing
//! about what the model actually recommended.

use super::diagnosis::{Tier, Treatment, MAX_TREATMENTS};

const GENERIC_TEMPLATES: [(&str, &str); 4] = [
    ("农业措施", "保持田间通风，适当控制氮肥使用量，增施钾肥。"),
    ("生物防治", "使用拮抗微生物制剂，抑制病菌生长。"),
    ("抗病品种", "选用抗病品种，可显著减少病害发生。"),
    ("物理防治", "适当修剪病叶，及时清理病残体，减少传染源。"),
];

const GENERIC_PRICE: &str = "¥30-50/亩";

/// Used as the first entry when nothing at all could be parsed.
pub fn fungicide_template() -> Treatment {
    Treatment::new(
        "喷洒杀菌剂",
        Tier::Medium,
        Tier::High,
        "¥40-60/亩",
        "使用专业杀菌剂喷洒，每7-10天一次，连续2-3次。",
    )
}

/// The ordered generic templates.
pub fn generic_templates() -> Vec<Treatment> {
    GENERIC_TEMPLATES
        .iter()
        .map(|(method, description)| {
            Treatment::new(*method, Tier::Medium, Tier::Medium, GENERIC_PRICE, *description)
        })
        .collect()
}

/// Steps the user can take when the model call itself failed.
pub fn remediation_templates() -> Vec<Treatment> {
    vec![
        Treatment::new(
            "重试连接",
            Tier::Low,
            Tier::High,
            "¥0",
            "检查网络连接后重新上传图片进行分析。",
        ),
        Treatment::new(
            "检查API配置",
            Tier::Low,
            Tier::Medium,
            "¥0",
            "确认API密钥和服务地址配置正确。",
        ),
        Treatment::new(
            "使用较小图片",
            Tier::Low,
            Tier::Medium,
            "¥0",
            "压缩图片或降低分辨率后重新上传。",
        ),
        Treatment::new(
            "重启应用",
            Tier::Low,
            Tier::Low,
            "¥0",
            "关闭并重新启动应用后再次尝试。",
        ),
    ]
}

/// Fill `treatments` up to four entries.
///
/// An empty list starts with the fungicide template. Generic templates are then
/// appended in order, cycling, skipping any method already present.
pub fn pad_treatments(treatments: &mut Vec<Treatment>) {
    if treatments.is_empty() {
        treatments.push(fungicide_template());
    }

    let templates = generic_templates();
    for template in templates.iter().cycle().take(templates.len() * 2) {
        if treatments.len() >= MAX_TREATMENTS {
            break;
        }
        if !treatments.iter().any(|t| t.method == template.method) {
            treatments.push(template.clone());
        }
    }
}
