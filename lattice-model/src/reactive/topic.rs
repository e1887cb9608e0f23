//! Bus topics.
//!
//! Every topic has the form `<verb> <member>`. The member `*` is the
//! any-member topic for a verb: it receives every event of that verb and is
//! never cleared by member removal.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Member placeholder for any-member topics.
pub const ANY_MEMBER: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verb {
    /// A record was added to a collection.
    Added,
    /// A scalar field changed, or a record field of a collection changed.
    Updated,
    /// A record was removed from a collection, or the member itself was removed.
    Removed,
    /// A member was added to the model.
    Extended,
    /// A derivation was registered.
    SetCalc,
    /// A derivation was torn down.
    UnsetCalc,
}

impl Verb {
    /// Verbs that carry a member's data changes. These are the topics
    /// cleared when the member is removed.
    pub const DATA: [Verb; 3] = [Verb::Added, Verb::Updated, Verb::Removed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Extended => "extended",
            Self::SetCalc => "set-calc",
            Self::UnsetCalc => "unset-calc",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "added" => Self::Added,
            "updated" => Self::Updated,
            "removed" => Self::Removed,
            "extended" => Self::Extended,
            "set-calc" => Self::SetCalc,
            "unset-calc" => Self::UnsetCalc,
            _ => return None,
        })
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic {
    verb: Verb,
    member: String,
}

impl Topic {
    pub fn new(verb: Verb, member: impl Into<String>) -> Self {
        Self {
            verb,
            member: member.into(),
        }
    }

    /// The any-member topic for `verb`.
    pub fn any(verb: Verb) -> Self {
        Self::new(verb, ANY_MEMBER)
    }

    /// Parse the textual `<verb> <member>` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (verb, member) = s.split_once(' ')?;
        if member.is_empty() || member.contains(char::is_whitespace) {
            return None;
        }
        Some(Self::new(Verb::parse(verb)?, member))
    }

    /// What kind of change the topic carries.
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// The member name, or `*` for any-member topics.
    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn is_any(&self) -> bool {
        self.member == ANY_MEMBER
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.member)
    }
}
