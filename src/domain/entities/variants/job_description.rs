use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords, Summary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    pub user_id: i32,
    pub url: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
}

impl Embeddable for JobDescription {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("title", &[FullText, Summary, Keywords]),
        FieldBinding::new("company", &[FullText, Summary, Keywords]),
        FieldBinding::new("description", &[FullText]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "url", &self.url, &previous.url);
        push_if_changed(&mut changed, "title", &self.title, &previous.title);
        push_if_changed(&mut changed, "company", &self.company, &previous.company);
        push_if_changed(&mut changed, "description", &self.description, &previous.description);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        let headline = join_present(&[self.title.as_deref(), self.company.as_deref()], " at ");
        match kind {
            FullText => join_present(&[headline.as_deref(), self.description.as_deref()], "\n"),
            Summary => headline,
            Keywords => join_present(&[self.title.as_deref(), self.company.as_deref()], ", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_change_invalidates_nothing() {
        let before = JobDescription {
            user_id: 9,
            url: Some("https://jobs.example.com/1".to_string()),
            title: Some("Backend Engineer".to_string()),
            company: Some("Initech".to_string()),
            description: Some("Build APIs.".to_string()),
        };
        let mut after = before.clone();
        after.url = Some("https://jobs.example.com/1?ref=mail".to_string());

        assert!(after.affected_kinds(&before).is_empty());
        assert_eq!(after.render(Summary).unwrap(), "Backend Engineer at Initech");
    }
}
