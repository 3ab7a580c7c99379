//! Logical collection names in the document store.

use std::fmt;

/// Collections that can be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Quizzes,
    Groups,
    GroupMembers,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Quizzes,
        Collection::Groups,
        Collection::GroupMembers,
        Collection::Users,
    ];

    /// Returns the stored name for this collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Quizzes => "quizzes",
            Collection::Groups => "groups",
            Collection::GroupMembers => "groupMembers",
            Collection::Users => "users",
        }
    }

    /// Parse from the stored name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == s)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
