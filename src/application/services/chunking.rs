/// Splits rendered entity text into embeddable chunks. Separators are tried
/// from coarsest to finest; sizes are measured in characters.
pub trait TextSplitter {
    fn split_text(&self, text: &str, max_chunk_chars: usize) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    separators: Vec<&'static str>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            separators: vec![
                "\n\n", // paragraphs
                "\n",
                ". ",
                " ",
                "",
            ],
        }
    }
}

impl TextSplitter for RecursiveSplitter {
    fn split_text(&self, text: &str, max_chunk_chars: usize) -> Vec<String> {
        let max_chunk_chars = max_chunk_chars.max(1);
        if char_len(text) <= max_chunk_chars {
            return vec![text.to_string()];
        }

        self.recursive_split(text, max_chunk_chars, 0)
    }
}

impl RecursiveSplitter {
    fn split_by_length(&self, text: &str, max_chunk_chars: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(max_chunk_chars)
            .map(|window| window.iter().collect())
            .collect()
    }

    fn recursive_split(
        &self,
        text: &str,
        max_chunk_chars: usize,
        separator_index: usize,
    ) -> Vec<String> {
        if char_len(text) <= max_chunk_chars {
            return vec![text.to_string()];
        }

        let Some(&separator) = self.separators.get(separator_index) else {
            return self.split_by_length(text, max_chunk_chars);
        };

        if separator.is_empty() {
            return self.split_by_length(text, max_chunk_chars);
        }

        let parts: Vec<&str> = text.split(separator).collect();
        if parts.len() == 1 {
            return self.recursive_split(text, max_chunk_chars, separator_index + 1);
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for part in parts {
            let candidate = if current.is_empty() {
                part.to_string()
            } else {
                format!("{}{}{}", current, separator, part)
            };

            if char_len(&candidate) <= max_chunk_chars {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = part.to_string();

            if char_len(&current) > max_chunk_chars {
                chunks.extend(self.recursive_split(&current, max_chunk_chars, separator_index + 1));
                current.clear();
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// One embeddable piece of an entity's rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: i32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    splitter: RecursiveSplitter,
    max_chunk_chars: usize,
}

impl Chunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            splitter: RecursiveSplitter::default(),
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    /// Trimmed, non-blank chunks numbered from 0 with no gaps. The same text
    /// always yields the same chunks.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        self.splitter
            .split_text(text, self.max_chunk_chars)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .enumerate()
            .map(|(index, text)| TextChunk {
                index: index as i32,
                text,
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(2000)
    }
}
