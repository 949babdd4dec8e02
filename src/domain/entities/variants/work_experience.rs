use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, date_range, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords, Summary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub profile_id: i32,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl Embeddable for WorkExperience {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("job_title", &[FullText, Keywords]),
        FieldBinding::new("company", &[FullText, Keywords]),
        FieldBinding::new("start_date", &[FullText]),
        FieldBinding::new("end_date", &[FullText]),
        FieldBinding::new("description", &[FullText, Summary]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "job_title", &self.job_title, &previous.job_title);
        push_if_changed(&mut changed, "company", &self.company, &previous.company);
        push_if_changed(&mut changed, "start_date", &self.start_date, &previous.start_date);
        push_if_changed(&mut changed, "end_date", &self.end_date, &previous.end_date);
        push_if_changed(&mut changed, "description", &self.description, &previous.description);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match kind {
            FullText => {
                let headline = join_present(
                    &[self.job_title.as_deref(), self.company.as_deref()],
                    " at ",
                );
                let period = date_range(self.start_date, self.end_date);
                join_present(
                    &[
                        headline.as_deref(),
                        period.as_deref(),
                        self.description.as_deref(),
                    ],
                    "\n",
                )
            }
            Summary => join_present(&[self.description.as_deref()], ""),
            Keywords => join_present(&[self.job_title.as_deref(), self.company.as_deref()], ", "),
        }
    }
}
