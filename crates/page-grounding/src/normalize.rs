use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold text into the form keywords and sentences are compared in.
///
/// Lower-cases, strips diacritics (NFD, then drops combining marks), turns
/// every character that is not a word character or whitespace into a space,
/// and collapses whitespace runs to a single space with no leading or trailing
/// space.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut gap = false;

    for ch in lowered.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if is_word_char(ch) {
            if gap && !out.is_empty() {
                out.push(' ');
            }
            gap = false;
            out.push(ch);
        } else {
            gap = true;
        }
    }

    out
}

/// Word characters are alphanumerics and `_`; the output of [`normalize`]
/// contains nothing else apart from single separating spaces.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_punctuation() {
        assert_eq!(normalize("Café! — 2024"), "cafe 2024");
        assert_eq!(normalize("Café! — 2024"), normalize("cafe 2024"));
        assert_eq!(normalize("Ångström, naïve résumé"), "angstrom naive resume");
    }

    #[test]
    fn collapses_and_trims_whitespace() {
        assert_eq!(normalize("  Office\t\tHours \n\n Monday  "), "office hours monday");
        assert_eq!(normalize("Dr. Smith's office"), "dr smith s office");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!... ---"), "");
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(normalize("CS_101: Intro"), "cs_101 intro");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("Résumé — Fall 2024 (Section B)!");
        assert_eq!(normalize(&once), once);
    }
}
