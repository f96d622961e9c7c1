//! Style tags appended to the music description.
use crate::display::{Console, Table};
use crate::prompts::Prompter;
use anyhow::Result;

/// Tag category shown as one numbered menu.
#[derive(Debug, Clone, Copy)]
pub struct TagCategory {
    pub name: &'static str,
    pub tags: &'static [&'static str],
}

pub const STYLE_TAGS: [TagCategory; 6] = [
    TagCategory {
        name: "Genre",
        tags: &[
            "pop",
            "rock",
            "hip-hop",
            "R&B",
            "electronic",
            "EDM",
            "jazz",
            "classical",
            "country",
            "folk",
            "metal",
            "blues",
            "reggae",
            "latin",
            "funk",
            "ambient",
            "lo-fi",
            "indie",
            "punk",
            "soul",
            "disco",
            "trap",
            "house",
            "techno",
            "K-pop",
        ],
    },
    TagCategory {
        name: "Mood",
        tags: &[
            "energetic",
            "chill",
            "dark",
            "happy",
            "sad",
            "romantic",
            "epic",
            "dreamy",
            "aggressive",
            "peaceful",
            "melancholic",
            "uplifting",
            "mysterious",
            "nostalgic",
            "playful",
            "dramatic",
        ],
    },
    TagCategory {
        name: "Instruments",
        tags: &[
            "piano",
            "acoustic guitar",
            "electric guitar",
            "synth",
            "bass",
            "strings",
            "brass",
            "drums",
            "percussion",
            "organ",
            "flute",
            "violin",
            "saxophone",
            "cello",
        ],
    },
    TagCategory {
        name: "Vocal Style",
        tags: &[
            "male vocal",
            "female vocal",
            "duet",
            "choir",
            "raspy",
            "falsetto",
            "clear vocal",
            "rap vocal",
        ],
    },
    TagCategory {
        name: "Era",
        tags: &["80s", "90s", "2000s", "modern", "retro", "vintage", "cinematic"],
    },
    TagCategory {
        name: "Production",
        tags: &[
            "lo-fi",
            "acoustic",
            "orchestral",
            "minimalist",
            "atmospheric",
            "distorted",
            "clean",
            "reverb-heavy",
        ],
    },
];

/// 1-based indexes picked from `count` items.
///
/// Numbers may be separated by spaces or commas. `d` or blank input picks
/// nothing; out-of-range and non-numeric parts are ignored.
pub fn parse_selection(input: &str, count: usize) -> Vec<usize> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("d") {
        return Vec::new();
    }
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|part| part.parse::<usize>().ok())
        .filter(|index| (1..=count).contains(index))
        .collect()
}

/// Walk every category and collect the chosen tags in order, without duplicates.
pub fn select_tags(prompter: &mut dyn Prompter, console: &mut dyn Console) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();
    for category in &STYLE_TAGS {
        let mut table = Table::new(category.name, &[]);
        for (idx, tag) in category.tags.iter().enumerate() {
            table.push_row(vec![(idx + 1).to_string(), tag.to_string()]);
        }
        console.table(&table);

        let answer = prompter.read_line(&format!(
            "Select {} tags (numbers separated by spaces, 'd' to skip)",
            category.name
        ))?;
        for index in parse_selection(&answer, category.tags.len()) {
            let tag = category.tags[index - 1];
            if !selected.iter().any(|existing| existing == tag) {
                selected.push(tag.to_string());
            }
        }
    }
    if !selected.is_empty() {
        console.line(&format!("Selected tags: {}", selected.join(", ")));
    }
    Ok(selected)
}

/// `"<prompt>. tag, tag"`, or the prompt unchanged when no tags were picked.
pub fn format_prompt_with_tags(prompt: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return prompt.to_string();
    }
    format!("{prompt}. {}", tags.join(", "))
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;
