use serde::{Deserialize, Serialize};
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};

pub const DEFAULT_DECKS: u8 = 6;

/// Which two-card totals may be doubled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_enum_str, Serialize_enum_str)]
pub enum DoubleRule {
    #[serde(rename = "any_two")]
    AnyTwo,
    #[serde(rename = "9_10")]
    NineTen,
    #[serde(rename = "9_11")]
    NineEleven,
    #[serde(rename = "10_11")]
    TenEleven,
}

impl Default for DoubleRule {
    fn default() -> Self {
        DoubleRule::AnyTwo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_enum_str, Serialize_enum_str)]
pub enum Surrender {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "late")]
    Late,
}

impl Default for Surrender {
    fn default() -> Self {
        Surrender::None
    }
}

/// A normalized, immutable table-rule configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rules {
    pub hit_soft17: bool,
    pub double_after_split: bool,
    pub resplit_aces: bool,
    pub double_rule: DoubleRule,
    pub peek: bool,
    pub surrender: Surrender,
    pub decks: u8,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            hit_soft17: false,
            double_after_split: true,
            resplit_aces: true,
            double_rule: DoubleRule::AnyTwo,
            peek: false,
            surrender: Surrender::None,
            decks: DEFAULT_DECKS,
        }
    }
}

/// Rule configuration as supplied by callers and config files. Every
/// field is optional; [`RawRules::normalize`] fills the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRules {
    pub hit_soft17: Option<bool>,
    pub double_after_split: Option<bool>,
    pub resplit_aces: Option<bool>,
    pub double_rule: Option<String>,
    pub peek: Option<bool>,
    pub surrender: Option<String>,
    pub decks: Option<u8>,
}

impl RawRules {
    /// Fills defaults and maps alias spellings onto the canonical enum
    /// values. Never fails: an unrecognized `doubleRule` or `surrender`
    /// string degrades to the default for that field.
    pub fn normalize(&self) -> Rules {
        let defaults = Rules::default();
        Rules {
            hit_soft17: self.hit_soft17.unwrap_or(defaults.hit_soft17),
            double_after_split: self
                .double_after_split
                .unwrap_or(defaults.double_after_split),
            resplit_aces: self.resplit_aces.unwrap_or(defaults.resplit_aces),
            double_rule: self
                .double_rule
                .as_deref()
                .map(parse_double_rule)
                .unwrap_or_default(),
            peek: self.peek.unwrap_or(defaults.peek),
            surrender: self
                .surrender
                .as_deref()
                .map(parse_surrender)
                .unwrap_or_default(),
            decks: self.decks.filter(|decks| *decks >= 1).unwrap_or(DEFAULT_DECKS),
        }
    }
}

fn parse_double_rule(raw: &str) -> DoubleRule {
    let canonical = match raw {
        "any" => "any_two",
        "9-10" => "9_10",
        "9-11" => "9_11",
        "10-11" => "10_11",
        other => other,
    };
    canonical.parse().unwrap_or_default()
}

fn parse_surrender(raw: &str) -> Surrender {
    raw.parse().unwrap_or_default()
}

/// Canonical tag identifying a normalized rule set, used to name and
/// key the split precompute table.
///
/// `surrender` is deliberately excluded: the surrender option never
/// changes the pre-decision shoe or hand composition that split EV
/// depends on. `resplit_aces` IS included, because it changes the
/// legality of chaining further splits after splitting Aces.
pub fn build_rule_tag(rules: &Rules) -> String {
    let soft = if rules.hit_soft17 { "H17" } else { "S17" };
    let das = if rules.double_after_split {
        "DAS"
    } else {
        "NDAS"
    };
    let rsa = if rules.resplit_aces { "RSA" } else { "NRSA" };
    let double_rule = match rules.double_rule {
        DoubleRule::AnyTwo => "any",
        DoubleRule::NineTen => "9-10",
        DoubleRule::NineEleven => "9-11",
        DoubleRule::TenEleven => "10-11",
    };
    let peek = if rules.peek { "PEEK" } else { "NOPEEK" };
    format!(
        "{}_{}_{}_DR-{}_{}_{}D",
        soft, das, rsa, double_rule, peek, rules.decks
    )
}
