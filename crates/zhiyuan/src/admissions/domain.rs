use serde::{Deserialize, Serialize};
use std::fmt;

/// First-choice subject track partitioning distributions and admission lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Physics,
    History,
}

impl Track {
    pub const ALL: [Track; 2] = [Track::Physics, Track::History];

    /// Documented default used whenever a caller supplies an unrecognized track.
    pub const FALLBACK: Track = Track::Physics;

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "物理" | "物理类" | "physics" => Some(Track::Physics),
            "历史" | "历史类" | "history" => Some(Track::History),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Track::Physics => "物理",
            Track::History => "历史",
        }
    }

    pub fn subject(self) -> Subject {
        match self {
            Track::Physics => Subject::Physics,
            Track::History => Subject::History,
        }
    }

    /// Infer the track from a free-text requirement such as "物理+化学".
    pub fn infer_from_requirement(raw: &str) -> Self {
        // "生物" would otherwise read as physics.
        let raw = raw.replace("生物", "");
        if raw.contains('物') {
            Track::Physics
        } else if raw.contains('史') {
            Track::History
        } else {
            Track::FALLBACK
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The six examination subjects an admission line may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Physics,
    Chemistry,
    Biology,
    Politics,
    History,
    Geography,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::Politics,
        Subject::History,
        Subject::Geography,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "物理" | "物" | "physics" => Some(Subject::Physics),
            "化学" | "化" | "chemistry" => Some(Subject::Chemistry),
            "生物" | "生" | "biology" => Some(Subject::Biology),
            "政治" | "政" | "politics" => Some(Subject::Politics),
            "历史" | "史" | "历" | "history" => Some(Subject::History),
            "地理" | "地" | "geography" => Some(Subject::Geography),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Subject::Physics => "物理",
            Subject::Chemistry => "化学",
            Subject::Biology => "生物",
            Subject::Politics => "政治",
            Subject::History => "历史",
            Subject::Geography => "地理",
        }
    }
}

/// Interest direction a student can filter majors by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestCategory {
    Science,
    Engineering,
    LiberalArts,
    EconomicsManagementLaw,
    Medicine,
    DesignArts,
    Languages,
}

impl InterestCategory {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "理科" | "science" => Some(Self::Science),
            "工科" | "engineering" => Some(Self::Engineering),
            "文科" | "liberal_arts" | "liberal-arts" => Some(Self::LiberalArts),
            "经管法" | "economics_management_law" | "business" => {
                Some(Self::EconomicsManagementLaw)
            }
            "医科" | "medicine" | "medical" => Some(Self::Medicine),
            "设计与艺术类" | "design_arts" | "arts" => Some(Self::DesignArts),
            "语言类" | "languages" | "language" => Some(Self::Languages),
            _ => None,
        }
    }

    /// Substrings of a major name that place it in this category.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Science => &[
                "数学", "物理", "化学", "生物", "统计", "天文", "地理科学", "心理", "力学",
            ],
            Self::Engineering => &[
                "工程", "计算机", "软件", "电子", "电气", "机械", "自动化", "通信", "土木",
                "材料", "智能", "信息",
            ],
            Self::LiberalArts => &[
                "汉语言", "历史", "哲学", "新闻", "社会", "政治", "教育", "文学", "考古",
            ],
            Self::EconomicsManagementLaw => &[
                "经济", "金融", "管理", "会计", "法学", "财务", "贸易", "商务", "审计", "税收",
            ],
            Self::Medicine => &[
                "医学", "临床", "护理", "药学", "口腔", "中医", "麻醉", "影像", "康复",
            ],
            Self::DesignArts => &[
                "设计", "美术", "艺术", "音乐", "舞蹈", "表演", "动画", "播音", "摄影",
            ],
            Self::Languages => &[
                "英语", "日语", "法语", "德语", "俄语", "西班牙语", "朝鲜语", "翻译", "外国语",
            ],
        }
    }
}

/// "Requires subject X" flags attached to an admission line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRequirements {
    pub physics: bool,
    pub chemistry: bool,
    pub biology: bool,
    pub politics: bool,
    pub history: bool,
    pub geography: bool,
}

impl SubjectRequirements {
    pub fn requires(&self, subject: Subject) -> bool {
        match subject {
            Subject::Physics => self.physics,
            Subject::Chemistry => self.chemistry,
            Subject::Biology => self.biology,
            Subject::Politics => self.politics,
            Subject::History => self.history,
            Subject::Geography => self.geography,
        }
    }

    pub fn set(&mut self, subject: Subject, required: bool) {
        let flag = match subject {
            Subject::Physics => &mut self.physics,
            Subject::Chemistry => &mut self.chemistry,
            Subject::Biology => &mut self.biology,
            Subject::Politics => &mut self.politics,
            Subject::History => &mut self.history,
            Subject::Geography => &mut self.geography,
        };
        *flag = required;
    }

    pub fn required_subjects(&self) -> impl Iterator<Item = Subject> + '_ {
        Subject::ALL
            .into_iter()
            .filter(move |subject| self.requires(*subject))
    }
}

/// One school + major admission line for the reference year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub id: u64,
    pub school_code: String,
    pub school_name: String,
    pub major_code: String,
    pub major_name: String,
    pub major_group_code: String,
    pub school_province: String,
    pub school_city: String,
    pub school_ownership: String,
    pub school_type: String,
    pub school_authority: String,
    pub school_level: String,
    pub school_tags: String,
    pub education_level: String,
    pub major_description: String,
    pub study_years: u8,
    pub tuition_fee: u32,
    pub is_new_major: bool,
    pub track: Track,
    pub requirements: SubjectRequirements,
    pub subject_requirement_raw: String,
    pub min_score: i32,
    pub min_rank: u32,
    pub enrollment_plan: u32,
    pub major_min_score: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_label() {
        for subject in Subject::ALL {
            assert_eq!(Subject::from_label(subject.label()), Some(subject));
        }
        for track in Track::ALL {
            assert_eq!(Track::from_label(track.label()), Some(track));
        }
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert_eq!(Track::from_label("艺术"), None);
        assert_eq!(Subject::from_label("技术"), None);
        assert_eq!(InterestCategory::from_label("体育"), None);
    }

    #[test]
    fn infers_track_from_raw_requirement() {
        assert_eq!(Track::infer_from_requirement("物理+化学"), Track::Physics);
        assert_eq!(Track::infer_from_requirement("历史"), Track::History);
        assert_eq!(Track::infer_from_requirement("不限"), Track::Physics);
        assert_eq!(Track::infer_from_requirement("历史+生物"), Track::History);
    }

    #[test]
    fn requirement_flags_are_addressable_by_subject() {
        let mut requirements = SubjectRequirements::default();
        requirements.set(Subject::Chemistry, true);
        requirements.set(Subject::Geography, true);

        let required: Vec<_> = requirements.required_subjects().collect();
        assert_eq!(required, vec![Subject::Chemistry, Subject::Geography]);
        assert!(!requirements.requires(Subject::Biology));
    }
}
