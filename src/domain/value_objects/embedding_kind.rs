use serde::{Deserialize, Serialize};

/// Tag distinguishing independent representations of the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    FullText,
    Summary,
    Keywords,
}

impl EmbeddingKind {
    pub const ALL: [EmbeddingKind; 3] = [
        EmbeddingKind::FullText,
        EmbeddingKind::Summary,
        EmbeddingKind::Keywords,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingKind::FullText => "full_text",
            EmbeddingKind::Summary => "summary",
            EmbeddingKind::Keywords => "keywords",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "full_text" => Ok(EmbeddingKind::FullText),
            "summary" => Ok(EmbeddingKind::Summary),
            "keywords" => Ok(EmbeddingKind::Keywords),
            _ => Err(format!("Invalid embedding kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmbeddingKind::from_string(s)
    }
}
