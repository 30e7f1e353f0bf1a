//! Cache key schema and key-pattern construction
//!
//! The read path writes entries under `{region}::{semantic_id}`. Paginated
//! listings append `_{page}_{size}` to the semantic id, and the pairwise
//! conversation lookup uses `{user_a}_{user_b}`. Every pattern produced here
//! uses Redis glob syntax so the same set can drive `SCAN MATCH` remotely and
//! [`glob_match`] locally.

use std::fmt::Display;

/// Separator between region name and semantic id
pub const KEY_SEPARATOR: &str = "::";

/// Cache region names shared with the read-path caching layer
pub mod regions {
    pub const CONVERSATION_DETAILS: &str = "conversationDetails";
    pub const CONVERSATION_MESSAGES: &str = "conversationMessages";
    pub const USER_CONVERSATIONS: &str = "userConversations";
    pub const MESSAGE: &str = "message";
    pub const CONVERSATION_BETWEEN_USERS: &str = "conversationBetweenUsers";

    /// Every region this subsystem manages
    pub const ALL: [&str; 5] = [
        CONVERSATION_DETAILS,
        CONVERSATION_MESSAGES,
        USER_CONVERSATIONS,
        MESSAGE,
        CONVERSATION_BETWEEN_USERS,
    ];
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Plain entry key
    /// Format: {region}::{id}
    pub fn entry(region: &str, id: impl Display) -> String {
        format!("{}{}{}", region, KEY_SEPARATOR, id)
    }

    /// Paginated listing key
    /// Format: {region}::{id}_{page}_{size}
    pub fn page(region: &str, id: impl Display, page: usize, size: usize) -> String {
        format!("{}{}{}_{}_{}", region, KEY_SEPARATOR, id, page, size)
    }

    /// Pairwise conversation lookup key, in the order given
    /// Format: conversationBetweenUsers::{a}_{b}
    pub fn pair(user_a: impl Display, user_b: impl Display) -> String {
        format!(
            "{}{}{}_{}",
            regions::CONVERSATION_BETWEEN_USERS,
            KEY_SEPARATOR,
            user_a,
            user_b
        )
    }

    /// Extract the region from a key
    pub fn region(key: &str) -> Option<&str> {
        key.split_once(KEY_SEPARATOR).map(|(region, _)| region)
    }
}

/// The fixed list of match patterns covering every key an entity can appear in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPatternSet {
    region: &'static str,
    patterns: Vec<String>,
}

impl KeyPatternSet {
    /// Exact key, id-prefixed keys and any key containing the id
    pub fn for_entity(region: &'static str, id: impl Display) -> Self {
        let id = id.to_string();
        let patterns = vec![
            CacheKey::entry(region, escape_glob(&id)),
            format!("{}{}{}*", region, KEY_SEPARATOR, escape_glob(&id)),
            format!("{}{}*{}*", region, KEY_SEPARATOR, escape_glob(&id)),
        ];
        Self { region, patterns }
    }

    /// [`for_entity`](Self::for_entity) plus one pattern per page `0..pages`
    pub fn for_paginated_entity(region: &'static str, id: impl Display, pages: usize) -> Self {
        let id = id.to_string();
        let mut set = Self::for_entity(region, &id);
        set.patterns.extend(
            (0..pages)
                .map(|page| format!("{}{}{}_{}_*", region, KEY_SEPARATOR, escape_glob(&id), page)),
        );
        set
    }

    /// Both orderings of the pairwise lookup key
    pub fn pairwise(user_a: impl Display, user_b: impl Display) -> Self {
        let a = escape_glob(&user_a.to_string());
        let b = escape_glob(&user_b.to_string());
        Self {
            region: regions::CONVERSATION_BETWEEN_USERS,
            patterns: vec![CacheKey::pair(&a, &b), CacheKey::pair(&b, &a)],
        }
    }

    /// Every pairwise lookup key naming `user`, whichever side it is on
    pub fn pairs_involving(user: impl Display) -> Self {
        let region = regions::CONVERSATION_BETWEEN_USERS;
        Self {
            region,
            patterns: vec![format!(
                "{}{}*{}*",
                region,
                KEY_SEPARATOR,
                escape_glob(&user.to_string())
            )],
        }
    }

    /// Pages `0..pages` of every listing in the region
    pub fn first_pages(region: &'static str, pages: usize) -> Self {
        Self {
            region,
            patterns: (0..pages)
                .map(|page| format!("{}{}*_{}_*", region, KEY_SEPARATOR, page))
                .collect(),
        }
    }

    /// Every key of the region
    pub fn whole_region(region: &'static str) -> Self {
        Self {
            region,
            patterns: vec![format!("{}{}*", region, KEY_SEPARATOR)],
        }
    }

    pub fn region(&self) -> &'static str {
        self.region
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True when any pattern of the set matches `key`
    pub fn matches(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, key))
    }
}

/// Escape glob metacharacters so an id is matched literally
pub fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Redis-style glob matching (`*`, `?`, `[...]`, `[^...]`, `\` escape)
pub fn glob_match(pattern: &str, key: &str) -> bool {
    match_bytes(pattern.as_bytes(), key.as_bytes())
}

fn match_bytes(p: &[u8], s: &[u8]) -> bool {
    match p.first() {
        None => s.is_empty(),
        Some(b'*') => {
            let mut rest = &p[1..];
            while rest.first() == Some(&b'*') {
                rest = &rest[1..];
            }
            if rest.is_empty() {
                return true;
            }
            (0..=s.len()).any(|i| match_bytes(rest, &s[i..]))
        }
        Some(b'?') => !s.is_empty() && match_bytes(&p[1..], &s[1..]),
        Some(b'[') => {
            let Some(&c) = s.first() else {
                return false;
            };
            match match_class(&p[1..], c) {
                Some((matched, consumed)) => matched && match_bytes(&p[1 + consumed..], &s[1..]),
                None => c == b'[' && match_bytes(&p[1..], &s[1..]),
            }
        }
        Some(b'\\') if p.len() >= 2 => s.first() == Some(&p[1]) && match_bytes(&p[2..], &s[1..]),
        Some(&c) => s.first() == Some(&c) && match_bytes(&p[1..], &s[1..]),
    }
}

/// Returns (matched, bytes consumed including the closing `]`), or None if unterminated
fn match_class(p: &[u8], c: u8) -> Option<(bool, usize)> {
    let (negate, mut i) = if p.first() == Some(&b'^') {
        (true, 1)
    } else {
        (false, 0)
    };
    let mut matched = false;

    loop {
        let &b = p.get(i)?;
        match b {
            b']' => return Some((matched != negate, i + 1)),
            b'\\' => {
                let &escaped = p.get(i + 1)?;
                matched |= escaped == c;
                i += 2;
            }
            _ => {
                if p.get(i + 1) == Some(&b'-') && p.get(i + 2).is_some_and(|&hi| hi != b']') {
                    let hi = p[i + 2];
                    let (lo, hi) = if b <= hi { (b, hi) } else { (hi, b) };
                    matched |= (lo..=hi).contains(&c);
                    i += 3;
                } else {
                    matched |= b == c;
                    i += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_formats() {
        assert_eq!(CacheKey::entry(regions::MESSAGE, "m1"), "message::m1");
        assert_eq!(
            CacheKey::page(regions::USER_CONVERSATIONS, "u1", 2, 20),
            "userConversations::u1_2_20"
        );
        assert_eq!(CacheKey::pair("a", "b"), "conversationBetweenUsers::a_b");
        assert_eq!(CacheKey::region("message::m1"), Some("message"));
        assert_eq!(CacheKey::region("invalid"), None);
    }

    #[test]
    fn test_entity_patterns_cover_plain_and_derived_keys() {
        let set = KeyPatternSet::for_entity(regions::CONVERSATION_DETAILS, "c1");
        assert_eq!(set.patterns().len(), 3);
        assert!(set.matches("conversationDetails::c1"));
        assert!(set.matches("conversationDetails::c1_full"));
        assert!(set.matches("conversationDetails::viewer_c1"));
        assert!(!set.matches("conversationDetails::c2"));
        assert!(!set.matches("conversationMessages::c1"));
    }

    #[test]
    fn test_paginated_patterns() {
        let set = KeyPatternSet::for_paginated_entity(regions::USER_CONVERSATIONS, "u1", 3);
        assert_eq!(set.patterns().len(), 6);
        assert!(set.patterns().contains(&"userConversations::u1_2_*".to_string()));
        assert!(set.matches("userConversations::u1_0_20"));
        assert!(set.matches("userConversations::u1_7_20"));
    }

    #[test]
    fn test_pairwise_patterns_cover_both_orders() {
        let set = KeyPatternSet::pairwise("a", "b");
        assert!(set.matches("conversationBetweenUsers::a_b"));
        assert!(set.matches("conversationBetweenUsers::b_a"));
        assert!(!set.matches("conversationBetweenUsers::a_c"));
    }

    #[test]
    fn test_pairs_involving_either_side() {
        let set = KeyPatternSet::pairs_involving("u1");
        assert_eq!(set.region(), regions::CONVERSATION_BETWEEN_USERS);
        assert!(set.matches("conversationBetweenUsers::u1_u2"));
        assert!(set.matches("conversationBetweenUsers::u3_u1"));
        assert!(!set.matches("conversationBetweenUsers::u2_u3"));
        assert!(!set.matches("userConversations::u1_0_20"));
    }

    #[test]
    fn test_first_pages_patterns() {
        let set = KeyPatternSet::first_pages(regions::USER_CONVERSATIONS, 2);
        assert!(set.matches("userConversations::u1_0_20"));
        assert!(set.matches("userConversations::u9_1_50"));
        assert!(!set.matches("userConversations::u1_2_20"));
        assert!(!set.matches("userConversations::u1_11_20"));
        assert!(!set.matches("userConversations::u1"));
    }

    #[test]
    fn test_whole_region() {
        let set = KeyPatternSet::whole_region(regions::MESSAGE);
        assert!(set.matches("message::anything"));
        assert!(!set.matches("messages::anything"));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("user:*", "user:123"));
        assert!(glob_match("user:?23", "user:123"));
        assert!(glob_match("user:[0-9]*", "user:1"));
        assert!(!glob_match("user:[^0-9]*", "user:1"));
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
        assert!(glob_match("**", ""));
        assert!(!glob_match("?", ""));
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("a*b"), "a\\*b");
        let set = KeyPatternSet::for_entity(regions::MESSAGE, "m*");
        assert!(set.matches("message::m*"));
        assert!(!set.matches("message::mx"));
    }
}
