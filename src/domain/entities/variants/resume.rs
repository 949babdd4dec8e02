use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Embeddable, FieldBinding, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords, Summary};

/// A generated resume, optionally tailored to a job description entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    pub profile_id: i32,
    pub job_description_uuid: Option<Uuid>,
    pub title: Option<String>,
    pub template_name: Option<String>,
    pub content: Option<String>,
    pub relevance_score: Option<f64>,
}

impl Embeddable for Resume {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("title", &[FullText, Summary, Keywords]),
        FieldBinding::new("content", &[FullText]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(
            &mut changed,
            "job_description_uuid",
            &self.job_description_uuid,
            &previous.job_description_uuid,
        );
        push_if_changed(&mut changed, "title", &self.title, &previous.title);
        push_if_changed(&mut changed, "template_name", &self.template_name, &previous.template_name);
        push_if_changed(&mut changed, "content", &self.content, &previous.content);
        push_if_changed(
            &mut changed,
            "relevance_score",
            &self.relevance_score,
            &previous.relevance_score,
        );
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match kind {
            FullText => join_present(&[self.title.as_deref(), self.content.as_deref()], "\n"),
            Summary | Keywords => join_present(&[self.title.as_deref()], ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescoring_keeps_embeddings() {
        let before = Resume {
            profile_id: 4,
            title: Some("Platform Engineer - Acme".to_string()),
            content: Some("...".to_string()),
            relevance_score: Some(0.61),
            ..Default::default()
        };
        let mut after = before.clone();
        after.relevance_score = Some(0.83);
        after.template_name = Some("compact".to_string());

        assert_eq!(after.changed_fields(&before).len(), 2);
        assert!(after.affected_kinds(&before).is_empty());
    }
}
