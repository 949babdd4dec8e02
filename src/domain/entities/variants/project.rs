use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, date_range, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords, Summary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub profile_id: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub project_url: Option<String>,
}

impl Embeddable for Project {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("title", &[FullText, Keywords]),
        FieldBinding::new("description", &[FullText, Summary]),
        FieldBinding::new("start_date", &[FullText]),
        FieldBinding::new("end_date", &[FullText]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "title", &self.title, &previous.title);
        push_if_changed(&mut changed, "description", &self.description, &previous.description);
        push_if_changed(&mut changed, "start_date", &self.start_date, &previous.start_date);
        push_if_changed(&mut changed, "end_date", &self.end_date, &previous.end_date);
        push_if_changed(&mut changed, "project_url", &self.project_url, &previous.project_url);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match kind {
            FullText => {
                let period = date_range(self.start_date, self.end_date);
                join_present(
                    &[
                        self.title.as_deref(),
                        period.as_deref(),
                        self.description.as_deref(),
                    ],
                    "\n",
                )
            }
            Summary => join_present(&[self.description.as_deref()], ""),
            Keywords => join_present(&[self.title.as_deref()], ""),
        }
    }
}
