//! Follow-up search queries for a diagnosis.

use crate::error::{PlantDiagError, Result};
use crate::models::Diagnosis;

const SEARCH_BASE_URL: &str = "https://www.baidu.com/s";

fn join_terms(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// More treatments for a disease on a given crop.
pub fn treatment_query(plant_type: Option<&str>, disease: &str) -> String {
    join_terms(&[plant_type.unwrap_or_default(), disease, "治疗方法"])
}

pub fn symptom_query(disease: &str) -> String {
    join_terms(&[disease, "症状 特征 图片"])
}

/// Step-by-step details for one treatment method.
pub fn method_query(disease: &str, method: &str) -> String {
    join_terms(&[disease, method, "详细步骤 使用方法"])
}

pub fn info_query(disease: &str) -> String {
    join_terms(&[disease, "防治方法 最新技术"])
}

/// Search page URL for a query, percent-encoded.
pub fn search_url(query: &str) -> Result<String> {
    reqwest::Url::parse_with_params(SEARCH_BASE_URL, &[("wd", query)])
        .map(|url| url.to_string())
        .map_err(|e| PlantDiagError::InvalidInput(format!("cannot build search URL: {}", e)))
}

/// Query strings worth offering next to a diagnosis, most specific first.
pub fn suggested_queries(diagnosis: &Diagnosis, plant_type: Option<&str>) -> Vec<String> {
    let mut queries = vec![
        treatment_query(plant_type, diagnosis.name()),
        symptom_query(diagnosis.name()),
    ];
    if let Some(first) = diagnosis.treatments().first() {
        queries.push(method_query(diagnosis.name(), &first.method));
    }
    queries.push(info_query(diagnosis.name()));
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_formats() {
        assert_eq!(treatment_query(Some("水稻"), "稻瘟病"), "水稻 稻瘟病 治疗方法");
        assert_eq!(treatment_query(None, "稻瘟病"), "稻瘟病 治疗方法");
        assert_eq!(symptom_query("白粉病"), "白粉病 症状 特征 图片");
        assert_eq!(
            method_query("白粉病", "喷施硫磺"),
            "白粉病 喷施硫磺 详细步骤 使用方法"
        );
        assert_eq!(info_query("锈病"), "锈病 防治方法 最新技术");
    }

    #[test]
    fn url_is_encoded() {
        let url = search_url("稻瘟病 治疗方法").unwrap();
        assert!(url.starts_with("https://www.baidu.com/s?wd="));
        assert!(!url.contains(' '));
        assert!(url.contains("%E7%A8%BB"));
    }

    #[test]
    fn suggestions_include_first_method() {
        let d = Diagnosis::new("霜霉病", "", 0.8, vec![]);
        let queries = suggested_queries(&d, Some("黄瓜"));
        assert_eq!(queries[0], "黄瓜 霜霉病 治疗方法");
        assert_eq!(queries[2], "霜霉病 喷洒杀菌剂 详细步骤 使用方法");
        assert_eq!(queries.len(), 4);
    }
}
