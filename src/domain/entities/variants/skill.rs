use serde::{Deserialize, Serialize};

use super::{Embeddable, FieldBinding, join_present, push_if_changed};
use crate::domain::value_objects::EmbeddingKind::{self, FullText, Keywords};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub profile_id: i32,
    pub category: Option<String>,
    pub name: Option<String>,
    pub proficiency: Option<String>,
}

impl Embeddable for Skill {
    const FIELD_BINDINGS: &'static [FieldBinding] = &[
        FieldBinding::new("category", &[FullText, Keywords]),
        FieldBinding::new("name", &[FullText, Keywords]),
        FieldBinding::new("proficiency", &[FullText]),
    ];

    fn changed_fields(&self, previous: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        push_if_changed(&mut changed, "category", &self.category, &previous.category);
        push_if_changed(&mut changed, "name", &self.name, &previous.name);
        push_if_changed(&mut changed, "proficiency", &self.proficiency, &previous.proficiency);
        changed
    }

    fn render(&self, kind: EmbeddingKind) -> Option<String> {
        match kind {
            FullText => {
                let name = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
                let mut text = name.to_string();
                if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
                    text.push_str(&format!(" ({})", category.trim()));
                }
                if let Some(level) = self.proficiency.as_deref().filter(|p| !p.trim().is_empty()) {
                    text.push_str(&format!(": {}", level.trim()));
                }
                Some(text)
            }
            Keywords => join_present(&[self.name.as_deref(), self.category.as_deref()], ", "),
            _ => None,
        }
    }
}
