//! Keyword-based categorization
//!
//! A category applies when any of its keyword variants occurs, case-insensitively,
//! anywhere in the title or tags of an item. Keyword lists carry simplified and
//! traditional Chinese, Japanese and English variants side by side.

use std::collections::{BTreeMap, BTreeSet};

/// Built-in label → keyword mapping used when the config does not supply one
const BUILTIN_RULES: &[(&str, &[&str])] = &[
    (
        "School",
        &[
            "school", "student", "teacher", "campus", "classroom", "学生", "學生", "教师",
            "教師", "老师", "老師", "教室", "校园", "校園", "学校", "學校", "制服", "女子校生",
        ],
    ),
    (
        "Office",
        &[
            "office", "secretary", "boss", "coworker", "办公室", "辦公室", "上司", "同事",
            "秘书", "秘書", "职场", "職場", "社長", "オフィス",
        ],
    ),
    (
        "Story",
        &[
            "story", "drama", "剧情", "劇情", "故事", "ドラマ", "ストーリー",
        ],
    ),
    (
        "Uncensored",
        &["uncensored", "无码", "無碼", "無修正", "流出"],
    ),
    (
        "Amateur",
        &["amateur", "素人", "业余", "業餘", "ナンパ"],
    ),
    (
        "Cosplay",
        &["cosplay", "角色扮演", "コスプレ", "anime", "动漫", "動漫"],
    ),
    (
        "Mature",
        &["mature", "milf", "熟女", "人妻", "妻子"],
    ),
    (
        "Outdoor",
        &["outdoor", "beach", "户外", "戶外", "野外", "露天", "温泉", "溫泉"],
    ),
];

/// Pure keyword classifier
///
/// Keywords are lowercased once at construction; [`Categorizer::categorize`]
/// has no side effects and returns the same set for the same input.
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<(String, Vec<String>)>,
}

impl Categorizer {
    /// Builds a categorizer from a label → keywords map
    ///
    /// Blank keywords are dropped, since an empty needle would match everything.
    pub fn new(mapping: &BTreeMap<String, Vec<String>>) -> Self {
        let rules = mapping
            .iter()
            .map(|(label, keywords)| {
                let keywords = keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
                (label.clone(), keywords)
            })
            .collect();
        Self { rules }
    }

    /// Categorizer over the built-in keyword table
    pub fn builtin() -> Self {
        Self::new(&builtin_mapping())
    }

    /// Returns every category whose keywords appear in the title or tags
    pub fn categorize(&self, title: &str, tags: &[String]) -> BTreeSet<String> {
        let mut haystack = title.to_lowercase();
        for tag in tags {
            haystack.push(' ');
            haystack.push_str(&tag.to_lowercase());
        }

        if haystack.trim().is_empty() {
            return BTreeSet::new();
        }

        self.rules
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Number of configured categories
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The built-in keyword table as an owned map
pub fn builtin_mapping() -> BTreeMap<String, Vec<String>> {
    BUILTIN_RULES
        .iter()
        .map(|(label, keywords)| {
            (
                label.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}
