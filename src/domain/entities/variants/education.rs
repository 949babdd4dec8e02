use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, date_range, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords, Summary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub profile_id: i32,
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub honors: Option<String>,
    pub gpa: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl Embeddable for Education {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("institution", &[FullText, Keywords]),
        FieldBinding::new("degree", &[FullText, Keywords]),
        FieldBinding::new("field_of_study", &[FullText, Keywords]),
        FieldBinding::new("honors", &[FullText]),
        FieldBinding::new("start_date", &[FullText]),
        FieldBinding::new("end_date", &[FullText]),
        FieldBinding::new("description", &[FullText]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "institution", &self.institution, &previous.institution);
        push_if_changed(&mut changed, "degree", &self.degree, &previous.degree);
        push_if_changed(
            &mut changed,
            "field_of_study",
            &self.field_of_study,
            &previous.field_of_study,
        );
        push_if_changed(&mut changed, "honors", &self.honors, &previous.honors);
        push_if_changed(&mut changed, "gpa", &self.gpa, &previous.gpa);
        push_if_changed(&mut changed, "start_date", &self.start_date, &previous.start_date);
        push_if_changed(&mut changed, "end_date", &self.end_date, &previous.end_date);
        push_if_changed(&mut changed, "description", &self.description, &previous.description);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        let subject = join_present(
            &[self.degree.as_deref(), self.field_of_study.as_deref()],
            " in ",
        );
        match kind {
            FullText => {
                let headline = join_present(
                    &[subject.as_deref(), self.institution.as_deref()],
                    ", ",
                );
                let period = date_range(self.start_date, self.end_date);
                join_present(
                    &[
                        headline.as_deref(),
                        period.as_deref(),
                        self.honors.as_deref(),
                        self.description.as_deref(),
                    ],
                    "\n",
                )
            }
            Keywords => join_present(
                &[
                    self.degree.as_deref(),
                    self.field_of_study.as_deref(),
                    self.institution.as_deref(),
                ],
                ", ",
            ),
            Summary => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpa_is_not_embedded() {
        let before = Education {
            profile_id: 1,
            institution: Some("ETH Zurich".to_string()),
            degree: Some("MSc".to_string()),
            field_of_study: Some("Computer Science".to_string()),
            gpa: Some(5.5),
            ..Default::default()
        };
        let mut after = before.clone();
        after.gpa = Some(5.7);

        assert_eq!(after.changed_fields(&before), vec!["gpa"]);
        assert!(after.affected_kinds(&before).is_empty());
        assert_eq!(
            after.render(FullText).unwrap(),
            "MSc in Computer Science, ETH Zurich"
        );
    }
}
