use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantKind {
    Rice,
    Wheat,
    Cucumber,
    Tomato,
    Eggplant,
}

impl PlantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantKind::Rice => "水稻",
            PlantKind::Wheat => "小麦",
            PlantKind::Cucumber => "黄瓜",
            PlantKind::Tomato => "番茄",
            PlantKind::Eggplant => "茄子",
        }
    }

    /// Match a free-text plant type hint by substring, Chinese or English.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.to_lowercase();
        let table: [(PlantKind, &str, &str); 5] = [
            (PlantKind::Rice, "水稻", "rice"),
            (PlantKind::Wheat, "小麦", "wheat"),
            (PlantKind::Cucumber, "黄瓜", "cucumber"),
            (PlantKind::Tomato, "番茄", "tomato"),
            (PlantKind::Eggplant, "茄子", "eggplant"),
        ];

        table
            .iter()
            .find(|(_, zh, en)| hint.contains(zh) || hint.contains(en))
            .map(|(kind, _, _)| *kind)
    }

    /// Most common disease for this crop, used when a reply has no structure.
    pub fn typical_disease(&self) -> (&'static str, &'static str) {
        match self {
            PlantKind::Rice => (
                "稻瘟病",
                "稻瘟病是由稻瘟病菌引起的一种常见的水稻疾病，表现为叶片上的褐色病斑和花颈部变黑。",
            ),
            PlantKind::Wheat => (
                "小麦锈病",
                "小麦锈病是由真菌引起的植物病害，表现为叶片上出现橙黄色或褐色的粉状物。",
            ),
            PlantKind::Cucumber | PlantKind::Tomato | PlantKind::Eggplant => (
                "霜霉病",
                "霜霉病是由真菌引起的疾病，在叶片表面形成白色或灰色的霉状物，严重时导致叶片枯死。",
            ),
        }
    }
}

impl std::fmt::Display for PlantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
