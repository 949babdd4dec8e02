use serde::{Deserialize, Serialize};

/// Discriminator stored in `entities.kind`. Fixes which variant table a row extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    WorkExperience,
    Education,
    Skill,
    Project,
    ProfessionalSummary,
    Resume,
    JobDescription,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::WorkExperience,
        EntityKind::Education,
        EntityKind::Skill,
        EntityKind::Project,
        EntityKind::ProfessionalSummary,
        EntityKind::Resume,
        EntityKind::JobDescription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::WorkExperience => "work_experience",
            EntityKind::Education => "education",
            EntityKind::Skill => "skill",
            EntityKind::Project => "project",
            EntityKind::ProfessionalSummary => "professional_summary",
            EntityKind::Resume => "resume",
            EntityKind::JobDescription => "job_description",
        }
    }

    /// Name of the variant table joined on `entities.id`.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::WorkExperience => "work_experiences",
            EntityKind::Education => "education",
            EntityKind::Skill => "skills",
            EntityKind::Project => "projects",
            EntityKind::ProfessionalSummary => "professional_summaries",
            EntityKind::Resume => "generated_resumes",
            EntityKind::JobDescription => "job_descriptions",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Invalid entity kind: {}", s))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::from_string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminators_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in EntityKind::ALL {
            assert!(seen.insert(kind.as_str()));
            assert_eq!(EntityKind::from_string(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_discriminator() {
        assert!(EntityKind::from_string("entity").is_err());
        assert!("Skill".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_serde_uses_discriminator() {
        let json = serde_json::to_string(&EntityKind::JobDescription).unwrap();
        assert_eq!(json, "\"job_description\"");
    }
}
