use serde::Serialize;

use crate::db::models::ClusterLabel;

const STUDY_KEYWORDS: [&str; 8] = [
    "assignment",
    "notes",
    "os",
    "dbms",
    "math",
    "study",
    "syllabus",
    "timet",
];

const WORK_KEYWORDS: [&str; 6] = ["invoice", "resume", "report", "project", "offer", "salary"];

/// Whole-token keyword hits for one normalised filename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeywordScore {
    pub study: usize,
    pub work: usize,
}

impl KeywordScore {
    pub fn of(normalized: &str) -> Self {
        normalized
            .split_whitespace()
            .fold(Self::default(), |mut score, token| {
                if STUDY_KEYWORDS.contains(&token) {
                    score.study += 1;
                }
                if WORK_KEYWORDS.contains(&token) {
                    score.work += 1;
                }
                score
            })
    }

    pub fn label(&self) -> ClusterLabel {
        if self.study > self.work && self.study > 0 {
            ClusterLabel::Study
        } else if self.work > 0 {
            ClusterLabel::Work
        } else {
            ClusterLabel::Personal
        }
    }
}

pub fn label_for(normalized: &str) -> ClusterLabel {
    KeywordScore::of(normalized).label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whole_tokens_only() {
        let score = KeywordScore::of("osmosis notes notes");
        assert_eq!(score, KeywordScore { study: 2, work: 0 });
        assert_eq!(KeywordScore::of("reporting").work, 0);
    }

    #[test]
    fn majority_decides_and_ties_go_to_work() {
        assert_eq!(label_for("os assignment"), ClusterLabel::Study);
        assert_eq!(label_for("project notes"), ClusterLabel::Work);
        assert_eq!(label_for("math notes for project"), ClusterLabel::Study);
        assert_eq!(label_for("salary slip"), ClusterLabel::Work);
        assert_eq!(label_for("vacation"), ClusterLabel::Personal);
        assert_eq!(label_for(""), ClusterLabel::Personal);
    }
}
