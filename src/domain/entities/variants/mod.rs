//! Concrete entity variants.
//!
//! Each variant declares, field by field, which embedding kinds its content
//! feeds. Editing a field invalidates exactly the kinds bound to it; fields
//! with no binding (foreign keys, scores, urls) never invalidate anything.

mod education;
mod job_description;
mod professional_summary;
mod project;
mod resume;
mod skill;
mod work_experience;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{EmbeddingKind, EntityKind};

pub use education::Education;
pub use job_description::JobDescription;
pub use professional_summary::ProfessionalSummary;
pub use project::Project;
pub use resume::Resume;
pub use skill::Skill;
pub use work_experience::WorkExperience;

/// One row of a variant's field-to-embedding-kind map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBinding {
    pub field: &'static str,
    pub kinds: &'static [EmbeddingKind],
}

impl FieldBinding {
    pub const fn new(field: &'static str, kinds: &'static [EmbeddingKind]) -> Self {
        Self { field, kinds }
    }
}

pub trait Embeddable {
    const FIELD_BINDINGS: &'static [FieldBinding];

    /// Names of fields whose value differs from `previous`.
    fn changed_fields(&self, previous: &Self) -> Vec<&'static str>;

    /// Text embedded for `kind`, or `None` when the entity has nothing to say
    /// for that representation.
    fn render(&self, kind: EmbeddingKind) -> Option<String>;

    fn embedding_kinds() -> BTreeSet<EmbeddingKind> {
        Self::FIELD_BINDINGS
            .iter()
            .flat_map(|binding| binding.kinds.iter().copied())
            .collect()
    }

    fn affected_kinds(&self, previous: &Self) -> BTreeSet<EmbeddingKind> {
        let changed = self.changed_fields(previous);
        Self::FIELD_BINDINGS
            .iter()
            .filter(|binding| changed.contains(&binding.field))
            .flat_map(|binding| binding.kinds.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityVariant {
    WorkExperience(WorkExperience),
    Education(Education),
    Skill(Skill),
    Project(Project),
    ProfessionalSummary(ProfessionalSummary),
    Resume(Resume),
    JobDescription(JobDescription),
}

impl EntityVariant {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityVariant::WorkExperience(_) => EntityKind::WorkExperience,
            EntityVariant::Education(_) => EntityKind::Education,
            EntityVariant::Skill(_) => EntityKind::Skill,
            EntityVariant::Project(_) => EntityKind::Project,
            EntityVariant::ProfessionalSummary(_) => EntityKind::ProfessionalSummary,
            EntityVariant::Resume(_) => EntityKind::Resume,
            EntityVariant::JobDescription(_) => EntityKind::JobDescription,
        }
    }

    pub fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match self {
            EntityVariant::WorkExperience(v) => v.render(kind),
            EntityVariant::Education(v) => v.render(kind),
            EntityVariant::Skill(v) => v.render(kind),
            EntityVariant::Project(v) => v.render(kind),
            EntityVariant::ProfessionalSummary(v) => v.render(kind),
            EntityVariant::Resume(v) => v.render(kind),
            EntityVariant::JobDescription(v) => v.render(kind),
        }
    }

    pub fn embedding_kinds(&self) -> BTreeSet<EmbeddingKind> {
        match self {
            EntityVariant::WorkExperience(_) => WorkExperience::embedding_kinds(),
            EntityVariant::Education(_) => Education::embedding_kinds(),
            EntityVariant::Skill(_) => Skill::embedding_kinds(),
            EntityVariant::Project(_) => Project::embedding_kinds(),
            EntityVariant::ProfessionalSummary(_) => ProfessionalSummary::embedding_kinds(),
            EntityVariant::Resume(_) => Resume::embedding_kinds(),
            EntityVariant::JobDescription(_) => JobDescription::embedding_kinds(),
        }
    }

    /// Embedding kinds invalidated by moving from `previous` to `self`.
    /// A kind change is not an edit, so every kind of both sides is returned.
    pub fn affected_kinds(&self, previous: &EntityVariant) -> BTreeSet<EmbeddingKind> {
        match (self, previous) {
            (EntityVariant::WorkExperience(a), EntityVariant::WorkExperience(b)) => {
                a.affected_kinds(b)
            }
            (EntityVariant::Education(a), EntityVariant::Education(b)) => a.affected_kinds(b),
            (EntityVariant::Skill(a), EntityVariant::Skill(b)) => a.affected_kinds(b),
            (EntityVariant::Project(a), EntityVariant::Project(b)) => a.affected_kinds(b),
            (EntityVariant::ProfessionalSummary(a), EntityVariant::ProfessionalSummary(b)) => {
                a.affected_kinds(b)
            }
            (EntityVariant::Resume(a), EntityVariant::Resume(b)) => a.affected_kinds(b),
            (EntityVariant::JobDescription(a), EntityVariant::JobDescription(b)) => {
                a.affected_kinds(b)
            }
            _ => self
                .embedding_kinds()
                .union(&previous.embedding_kinds())
                .copied()
                .collect(),
        }
    }
}

/// Joins the non-blank parts with `separator`; `None` if nothing remains.
pub(crate) fn join_present(parts: &[Option<&str>], separator: &str) -> Option<String> {
    let present: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect();

    if present.is_empty() {
        None
    } else {
        Some(present.join(separator))
    }
}

pub(crate) fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<String> {
    match (start, end) {
        (None, None) => None,
        (Some(start), None) => Some(format!("{} - present", start.format("%Y-%m"))),
        (None, Some(end)) => Some(format!("until {}", end.format("%Y-%m"))),
        (Some(start), Some(end)) => Some(format!(
            "{} - {}",
            start.format("%Y-%m"),
            end.format("%Y-%m")
        )),
    }
}

pub(crate) fn push_if_changed<T: PartialEq>(
    changed: &mut Vec<&'static str>,
    field: &'static str,
    current: &T,
    previous: &T,
) {
    if current != previous {
        changed.push(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_present_skips_blanks() {
        assert_eq!(
            join_present(&[Some("Rust"), None, Some("  "), Some("Go")], ", "),
            Some("Rust, Go".to_string())
        );
        assert_eq!(join_present(&[None, Some(" ")], ", "), None);
    }

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1);
        let end = NaiveDate::from_ymd_opt(2023, 9, 30);
        assert_eq!(date_range(start, end).unwrap(), "2021-03 - 2023-09");
        assert_eq!(date_range(start, None).unwrap(), "2021-03 - present");
        assert_eq!(date_range(None, None), None);
    }

    #[test]
    fn test_kind_change_invalidates_everything() {
        let skill = EntityVariant::Skill(Skill {
            profile_id: 1,
            name: Some("Rust".to_string()),
            ..Default::default()
        });
        let summary = EntityVariant::ProfessionalSummary(ProfessionalSummary {
            profile_id: 1,
            summary_text: Some("Engineer".to_string()),
        });

        let affected = summary.affected_kinds(&skill);
        assert!(affected.contains(&EmbeddingKind::FullText));
        assert!(affected.contains(&EmbeddingKind::Keywords));
    }

    #[test]
    fn test_serde_tag_matches_discriminator() {
        let variant = EntityVariant::JobDescription(JobDescription {
            user_id: 3,
            title: Some("Backend Engineer".to_string()),
            ..Default::default()
        });
        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(json["kind"], variant.kind().as_str());
    }
}
