//! Read-time content hiding driven by per-user blocklists.
//!
//! Blocklists are never baked into stored content, so a blocklist change
//! applies to the next read.

use std::collections::HashSet;

use serde::Serialize;

/// Anything with an author and a set of tags.
pub trait ContentItem {
    fn author_id(&self) -> &str;
    fn tags(&self) -> &[String];
}

/// Borrowed view of a content item.
#[derive(Debug, Clone, Copy)]
pub struct ContentRef<'a> {
    pub author_id: &'a str,
    pub tags: &'a [String],
}

impl ContentItem for ContentRef<'_> {
    fn author_id(&self) -> &str {
        self.author_id
    }

    fn tags(&self) -> &[String] {
        self.tags
    }
}

/// Authors and tags a viewer does not want to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Blocklist {
    pub users: HashSet<String>,
    pub tags: HashSet<String>,
}

impl Blocklist {
    pub fn new(users: HashSet<String>, tags: HashSet<String>) -> Self {
        Self { users, tags }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.tags.is_empty()
    }

    /// Drop every item this blocklist hides, keeping order.
    pub fn retain_visible<T: ContentItem>(&self, mut items: Vec<T>) -> Vec<T> {
        if !self.is_empty() {
            items.retain(|item| !should_hide(item, self));
        }
        items
    }
}

/// True when the author is blocked or any tag is blocked.
pub fn should_hide<T: ContentItem + ?Sized>(content: &T, blocklist: &Blocklist) -> bool {
    blocklist.users.contains(content.author_id())
        || content.tags().iter().any(|tag| blocklist.tags.contains(tag))
}
