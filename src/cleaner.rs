use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// One step of the cleaning pipeline.
#[derive(Debug, Clone)]
pub enum CleanRule {
    /// Every match is replaced with `replacement`.
    Pattern { regex: Regex, replacement: String },
    /// `from` is replaced with `to` until no occurrence is left.
    Literal { from: String, to: String },
}

impl CleanRule {
    pub fn pattern(pattern: &str, replacement: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid cleaning pattern {pattern:?}"))?;

        Ok(CleanRule::Pattern {
            regex,
            replacement: replacement.to_string(),
        })
    }

    pub fn literal(from: &str, to: &str) -> Result<Self> {
        if from.is_empty() || to.len() >= from.len() {
            anyhow::bail!("literal rule {from:?} -> {to:?} must shrink the text");
        }

        Ok(CleanRule::Literal {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    fn apply(&self, text: String) -> String {
        match self {
            CleanRule::Pattern { regex, replacement } => {
                regex.replace_all(&text, replacement.as_str()).into_owned()
            }
            CleanRule::Literal { from, to } => {
                let mut text = text;
                while text.contains(from.as_str()) {
                    text = text.replace(from.as_str(), to);
                }
                text
            }
        }
    }
}

/// Strips citation noise the model copies out of the source books.
#[derive(Debug, Clone)]
pub struct ResponseCleaner {
    rules: Vec<CleanRule>,
}

impl ResponseCleaner {
    pub fn new(rules: Vec<CleanRule>) -> Self {
        Self { rules }
    }

    pub fn medical() -> Result<Self> {
        Ok(Self::new(vec![
            CleanRule::pattern(r"\(Source:[^)]*\)", " ")?,
            CleanRule::pattern(r"\bPage\s+\d+", " ")?,
            CleanRule::pattern(r"\bGALE ENCYCLOPEDIA.*", " ")?,
            CleanRule::pattern(r"\s+", " ")?,
            CleanRule::literal("..", ".")?,
            CleanRule::literal("  ", " ")?,
        ]))
    }

    pub fn clean(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(acc))
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn cleaner() -> ResponseCleaner {
        ResponseCleaner::medical().unwrap()
    }

    const SAMPLES: &[&str] = &[
        "The flu (Source: p.12) is common.  Page 4",
        "Acne is a skin condition (source: GALE p. 33).\n\nIt affects teens.",
        "page 12 Treatment includes rest... and fluids..",
        "GALE ENCYCLOPEDIA OF MEDICINE 2 35\nAnemia is a low red cell count.",
        "Gale Encyclopedia of Medicine, page 7",
        "   \t  ",
        "",
        "(Source: a\nb) Measles spreads through the air.",
        "Diabetes.\u{00A0}\u{00A0}Page\t\t9 (Source: x)(Source: y)....",
    ];

    #[test]
    fn worked_example() {
        assert_eq!(
            cleaner().clean("The flu (Source: p.12) is common.  Page 4"),
            "The flu is common."
        );
    }

    #[test]
    fn source_spans_are_removed() {
        for sample in SAMPLES {
            let out = cleaner().clean(sample);
            assert!(!out.to_lowercase().contains("(source:"), "{sample:?} -> {out:?}");
        }
    }

    #[test]
    fn page_numbers_are_removed() {
        let out = cleaner().clean("Gout (see PAGE 112) hurts. Page\n\n9 more.");
        assert_eq!(out, "Gout (see ) hurts. more.");
        for sample in SAMPLES {
            let out = cleaner().clean(sample);
            let page = Regex::new(r"(?i)\bpage\s+\d").unwrap();
            assert!(!page.is_match(&out), "{sample:?} -> {out:?}");
        }
    }

    #[test]
    fn encyclopedia_footer_runs_to_end_of_line() {
        assert_eq!(
            cleaner().clean("Rest helps. GALE ENCYCLOPEDIA OF MEDICINE 2 1024\nDrink water."),
            "Rest helps. Drink water."
        );
    }

    #[test]
    fn footer_split_across_lines_survives_one_pass() {
        let once = cleaner().clean("Intro. GALE\nENCYCLOPEDIA OF MEDICINE\nAnemia is low.");
        assert_eq!(once, "Intro. GALE ENCYCLOPEDIA OF MEDICINE Anemia is low.");
        assert_eq!(cleaner().clean(&once), "Intro.");
    }

    #[test]
    fn no_double_spaces_or_periods_survive() {
        for sample in SAMPLES {
            let out = cleaner().clean(sample);
            assert!(!out.contains("  "), "{sample:?} -> {out:?}");
            assert!(!out.contains(".."), "{sample:?} -> {out:?}");
            assert_eq!(out, out.trim());
        }
    }

    #[test]
    fn clean_text_only_loses_outer_whitespace() {
        assert_eq!(
            cleaner().clean("  Hypertension is high blood pressure.\n"),
            "Hypertension is high blood pressure."
        );
    }

    #[test]
    fn cleaning_twice_changes_nothing() {
        for sample in SAMPLES {
            let once = cleaner().clean(sample);
            assert_eq!(cleaner().clean(&once), once, "{sample:?}");
        }
    }

    #[test]
    fn everything_removed_yields_empty_string() {
        assert_eq!(cleaner().clean("(Source: book) Page 3"), "");
    }

    #[test]
    fn literal_rules_must_shrink() {
        assert!(CleanRule::literal(".", "..").is_err());
        assert!(CleanRule::literal("", "").is_err());
        assert!(CleanRule::literal("..", ".").is_ok());
    }
}
