//! Tag requirements and scoring for provider selection.
//!
//! A requirement list mixes plain tags (required), `+tag` (preferred),
//! `-tag` (excluded) and nested lists (OR groups: at least one member must
//! be present). Matching is a hard filter plus a score used to rank
//! survivors.

use serde::{Deserialize, Serialize};

/// Score awarded for each satisfied required tag or plain OR-group match.
pub const REQUIRED_TAG_SCORE: u32 = 5;

/// Score awarded for each satisfied preferred tag.
pub const PREFERRED_TAG_SCORE: u32 = 10;

/// One entry of a tag requirement list as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagEntry {
    /// A single tag, optionally prefixed with `+` or `-`.
    Tag(String),
    /// OR alternatives; any member satisfies the group.
    AnyOf(Vec<String>),
}

/// Parsed tag requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagRequirements {
    entries: Vec<TagEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOperator<'a> {
    Required(&'a str),
    Preferred(&'a str),
    Excluded(&'a str),
}

impl<'a> TagOperator<'a> {
    fn parse(raw: &'a str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(tag) = trimmed.strip_prefix('+') {
            return (!tag.is_empty()).then_some(Self::Preferred(tag));
        }
        if let Some(tag) = trimmed.strip_prefix('-') {
            return (!tag.is_empty()).then_some(Self::Excluded(tag));
        }
        (!trimmed.is_empty()).then_some(Self::Required(trimmed))
    }
}

impl TagRequirements {
    /// Creates requirements from wire entries, dropping empty tags and groups.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = TagEntry>) -> Self {
        let kept = entries
            .into_iter()
            .filter_map(|entry| match entry {
                TagEntry::Tag(tag) if tag.trim().is_empty() => None,
                TagEntry::AnyOf(group) => {
                    let members: Vec<String> = group
                        .into_iter()
                        .filter(|member| !member.trim().is_empty())
                        .collect();
                    (!members.is_empty()).then_some(TagEntry::AnyOf(members))
                }
                tag @ TagEntry::Tag(_) => Some(tag),
            })
            .collect();
        Self { entries: kept }
    }

    /// Creates requirements from plain tag strings.
    #[must_use]
    pub fn from_tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(tags.into_iter().map(|tag| TagEntry::Tag(tag.into())))
    }

    /// Returns the wire entries.
    #[must_use]
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Returns whether no requirement was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattens entries to strings for storage columns.
    ///
    /// OR groups are rendered as `a|b`.
    #[must_use]
    pub fn to_flat_tags(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| match entry {
                TagEntry::Tag(tag) => tag.clone(),
                TagEntry::AnyOf(group) => group.join("|"),
            })
            .collect()
    }

    /// Scores `provider_tags` against these requirements.
    ///
    /// Returns `None` when a required tag is missing, an excluded tag is
    /// present, or an OR group has no satisfied member.
    #[must_use]
    pub fn score(&self, provider_tags: &[String]) -> Option<u32> {
        let has = |tag: &str| provider_tags.iter().any(|provided| provided == tag);
        let mut score = 0;

        for entry in &self.entries {
            match entry {
                TagEntry::Tag(raw) => match TagOperator::parse(raw) {
                    Some(TagOperator::Required(tag)) => {
                        if !has(tag) {
                            return None;
                        }
                        score += REQUIRED_TAG_SCORE;
                    }
                    Some(TagOperator::Preferred(tag)) => {
                        if has(tag) {
                            score += PREFERRED_TAG_SCORE;
                        }
                    }
                    Some(TagOperator::Excluded(tag)) => {
                        if has(tag) {
                            return None;
                        }
                    }
                    None => {}
                },
                TagEntry::AnyOf(group) => score += score_group(group, &has)?,
            }
        }

        Some(score)
    }
}

fn score_group(group: &[String], has: &impl Fn(&str) -> bool) -> Option<u32> {
    let mut best: Option<u32> = None;
    for member in group {
        match TagOperator::parse(member) {
            Some(TagOperator::Excluded(tag)) => {
                if has(tag) {
                    return None;
                }
            }
            Some(TagOperator::Preferred(tag)) if has(tag) => {
                best = Some(PREFERRED_TAG_SCORE);
            }
            Some(TagOperator::Required(tag)) if has(tag) => {
                best = Some(best.map_or(REQUIRED_TAG_SCORE, |current| {
                    current.max(REQUIRED_TAG_SCORE)
                }));
            }
            _ => {}
        }
    }
    best
}
