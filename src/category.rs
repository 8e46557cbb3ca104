use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse event category derived from an event summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Births.
    Birth,
    /// Deaths, funerals and burials.
    Death,
    /// Prizes, medals and decorations.
    Award,
    /// Releases, premieres, performances and publications.
    Release,
    /// Appointments and career starts.
    Work,
    /// Journeys, tours and relocations.
    Travel,
    /// Anything else.
    Other,
}

/// Keyword groups in priority order. First group with a substring match wins.
const KEYWORD_GROUPS: [(Category, &[&str]); 6] = [
    (Category::Birth, &["birth", "born"]),
    (
        Category::Death,
        &["death", "died", "deceased", "funeral", "buried", "burial"],
    ),
    (Category::Award, &["award", "prize", "medal", "decorated"]),
    (
        Category::Release,
        &["release", "premiere", "performance", "concert", "publish"],
    ),
    (Category::Work, &["became", "began", "appointed"]),
    (Category::Travel, &["travel", "moved to", "toured", "visit"]),
];

impl Category {
    /// Lower-case label stored in the `category` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Birth => "birth",
            Category::Death => "death",
            Category::Award => "award",
            Category::Release => "release",
            Category::Work => "work",
            Category::Travel => "travel",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a summary by case-insensitive keyword containment.
pub fn classify(summary: &str) -> Category {
    let summary = summary.to_lowercase();
    KEYWORD_GROUPS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| summary.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}
