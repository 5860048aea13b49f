// src/utils/fragment_debug.rs
use crate::dispenser::parse_numeral;
use crate::utils::error::StorageError;
use std::fs;
use std::path::Path;

/// Renders fragments one sentence per line. Each fragment is bracketed,
/// numerals with braces, so label misses can be traced to how the text was
/// split.
pub fn render_fragments(fragments: &[String]) -> String {
    let mut out = String::new();
    let mut sentence = 0;
    let mut line_open = false;

    for fragment in fragments {
        if !line_open {
            sentence += 1;
            out.push_str(&format!("{:>4}: ", sentence));
            line_open = true;
        }
        let word = fragment.trim_end_matches(' ');
        if parse_numeral(word).is_some() {
            out.push_str(&format!("{{{}}}", word));
        } else {
            out.push_str(&format!("[{}]", word));
        }
        if fragment.ends_with(' ') {
            out.push(' ');
        } else {
            out.push('\n');
            line_open = false;
        }
    }
    if line_open {
        out.push('\n');
    }
    out
}

/// Saves the rendered fragments to `path`
pub fn save_fragment_dump(fragments: &[String], path: &Path) -> Result<(), StorageError> {
    fs::write(path, render_fragments(fragments))?;
    tracing::info!("Saved fragment dump to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_marks_sentences_and_numerals() {
        let fragments: Vec<String> = ["Franked ", "Amount: ", "$36.00", "ASX ", "Code: ", "XYZ "]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            render_fragments(&fragments),
            "   1: [Franked] [Amount:] {$36.00}\n   2: [ASX] [Code:] [XYZ] \n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_fragments(&[]), "");
    }
}
