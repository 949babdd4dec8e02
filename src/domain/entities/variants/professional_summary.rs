use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Summary};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalSummary {
    pub profile_id: i32,
    pub summary_text: Option<String>,
}

impl Embeddable for ProfessionalSummary {
    const FIELD_BINDINGS: &'static [FieldBinding] =
        &[FieldBinding::new("summary_text", &[FullText, Summary])];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "summary_text", &self.summary_text, &previous.summary_text);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match kind {
            FullText | Summary => join_present(&[self.summary_text.as_deref()], ""),
            _ => None,
        }
    }
}
