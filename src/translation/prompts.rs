/*!
 * Prompt construction for chunk translation requests.
 */

use std::collections::BTreeMap;

use crate::app_config::Tone;
use crate::translation::chunker::Chunk;

/// System prompt establishing the output contract: a JSON array of strings,
/// same count and order as the input, nothing else.
pub const SYSTEM_PROMPT: &str = "You are a professional subtitle translator. \
Translate Chinese subtitle lines to Vietnamese. Output must be a JSON array of \
strings only (e.g. [\"...\", \"...\"]). Do NOT include indices, timestamps, \
explanations, or any other text. Preserve the number and order of lines exactly \
as input. Remove any leading numbering in the input lines before translating. \
Keep translations concise, preserve tone, and maintain name consistency using \
the provided NameMap. If unsure, translate literally but naturally. If an input \
line is an empty string, output an empty string for that line. Output must be \
valid JSON.";

/// Build the per-chunk user prompt: name map, tone, index range and the
/// JSON-encoded lines, followed by the count reminder.
pub fn build_user_prompt(chunk: &Chunk, name_map: &BTreeMap<String, String>, tone: Tone) -> String {
    let lines: Vec<&str> = chunk.source_texts();
    let name_map_json = serde_json::to_string(name_map).unwrap_or_else(|_| "{}".to_string());
    let lines_json = serde_json::to_string(&lines).unwrap_or_else(|_| "[]".to_string());

    format!(
        "NameMap: {name_map}\n\
         Tone: {tone}\n\
         ChunkIndices: [{start}-{end}]\n\
         Lines: {lines}\n\n\
         Translate the Lines array from Chinese to Vietnamese. Return a JSON \
         array of {count} strings only. Ensure the i-th output corresponds to \
         the i-th input line. DO NOT add numbering or timestamps. If a name \
         from NameMap appears, use its mapping. A translated line that still \
         contains Chinese characters counts as invalid.",
        name_map = name_map_json,
        tone = tone,
        start = chunk.start_index,
        end = chunk.end_index,
        lines = lines_json,
        count = chunk.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::chunker::Line;

    fn chunk() -> Chunk {
        Chunk {
            start_index: 11,
            end_index: 12,
            lines: vec![Line::new(11, "你好"), Line::new(12, "再见")],
        }
    }

    #[test]
    fn test_build_user_prompt_withChunk_shouldEmbedRangeAndCount() {
        let prompt = build_user_prompt(&chunk(), &BTreeMap::new(), Tone::Conversational);
        assert!(prompt.contains("ChunkIndices: [11-12]"));
        assert!(prompt.contains("array of 2 strings"));
        assert!(prompt.contains("\u{4F60}\u{597D}"));
    }

    #[test]
    fn test_build_user_prompt_withNameMap_shouldEmbedMapJson() {
        let mut name_map = BTreeMap::new();
        name_map.insert("小明".to_string(), "Tiểu Minh".to_string());
        let prompt = build_user_prompt(&chunk(), &name_map, Tone::Formal);
        assert!(prompt.contains("Tiểu Minh"));
        assert!(prompt.contains("Tone: formal"));
    }
}
