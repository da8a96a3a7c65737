//! Analysis prompt template

use crate::config::ResponseFormat;

/// Keys requested from the model in structured mode
pub const STRUCTURED_KEYS: [&str; 4] = [
    "emotional_tone",
    "key_themes",
    "readability",
    "sentiment_score",
];

/// Build the instruction sent to the model for one story.
///
/// The story text is embedded verbatim.
pub fn build_prompt(story: &str, format: ResponseFormat) -> String {
    let mut prompt = String::with_capacity(story.len() + 512);
    prompt.push_str(
        "Analyze the following story and provide insights on its emotional tone, \
         key themes, and readability.\n\n",
    );
    prompt.push_str("Story:\n");
    prompt.push_str(story);
    prompt.push_str("\n\n");

    match format {
        ResponseFormat::Text => {
            prompt.push_str(
                "Answer in plain prose, one short paragraph per point. \
                 Do not include your reasoning.",
            );
        }
        ResponseFormat::Json => {
            let keys = STRUCTURED_KEYS
                .iter()
                .map(|k| format!("\"{}\"", k))
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!(
                "Respond with a single JSON object and nothing else. Use the keys {}. \
                 \"key_themes\" is an array of strings and \"sentiment_score\" is a number \
                 between -1 and 1.",
                keys
            ));
        }
    }

    prompt
}
