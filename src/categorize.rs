use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_CATEGORY: &str = "tshirt/men";

static JR_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bjr\b").expect("hardcoded jr regex is valid"));

enum Matcher {
    /// Any of the keywords appears in the lowercased caption.
    Contains(&'static [&'static str]),
    /// The pattern matches the lowercased caption.
    Pattern(&'static LazyLock<Regex>),
}

impl Matcher {
    fn matches(&self, caption: &str) -> bool {
        match self {
            Self::Contains(keywords) => keywords.iter().any(|keyword| caption.contains(keyword)),
            Self::Pattern(pattern) => pattern.is_match(caption),
        }
    }
}

struct CategoryRule {
    matcher: Matcher,
    category: &'static str,
}

const fn contains(keywords: &'static [&'static str], category: &'static str) -> CategoryRule {
    CategoryRule {
        matcher: Matcher::Contains(keywords),
        category,
    }
}

// Order matters: the first matching rule wins, so overlapping keywords are
// resolved by position (fleece before jacket, header before card, jogger
// before pants, side print before shorts).
static RULES: [CategoryRule; 18] = [
    contains(&["beanie"], "beanie"),
    contains(&["bottle"], "bottle"),
    contains(&["header"], "signage"),
    contains(&["card"], "signage"),
    contains(&["hat"], "hat"),
    contains(&["flannels"], "flannels"),
    contains(&["plush"], "plush"),
    contains(&["fleece"], "jacket"),
    contains(&["jacket"], "jacket"),
    contains(&["side_print", "side print"], "shorts"),
    contains(&["shorts"], "shorts"),
    contains(&["socks"], "socks"),
    contains(&["sticker"], "sticker"),
    contains(&["jogger"], "pants"),
    contains(&["pants"], "pants"),
    contains(&["banner"], "banner"),
    contains(&["shelf"], "banner"),
    CategoryRule {
        matcher: Matcher::Pattern(&JR_WORD),
        category: "tshirt/women",
    },
];

/// Maps a caption to its category path. Every caption maps to exactly one
/// category; captions no rule recognizes land in [`DEFAULT_CATEGORY`].
#[must_use]
pub fn categorize(caption: &str) -> &'static str {
    let lowered = caption.to_lowercase();
    RULES
        .iter()
        .find(|rule| rule.matcher.matches(&lowered))
        .map_or(DEFAULT_CATEGORY, |rule| rule.category)
}
