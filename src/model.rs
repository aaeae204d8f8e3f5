use std::collections::BTreeMap;

const ARCHIVED_SUFFIX: &str = "(ARCHIVED)";

/// An organization member and the permission they hold on each repository column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub login: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub two_factor_enabled: Option<bool>,
    /// Keyed by repository column heading, never by a base column.
    pub permissions: BTreeMap<String, String>,
}

impl Member {
    pub fn new(login: impl Into<String>, name: Option<String>) -> Self {
        Self {
            login: login.into(),
            name,
            role: None,
            two_factor_enabled: None,
            permissions: BTreeMap::new(),
        }
    }
}

/// Members keyed by login, the join key against collaborator edges.
#[derive(Debug, Default)]
pub struct Members {
    by_login: BTreeMap<String, Member>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member, replacing any earlier record with the same login.
    pub fn insert(&mut self, member: Member) -> Option<Member> {
        let previous = self.by_login.insert(member.login.clone(), member);
        if let Some(prev) = &previous {
            tracing::warn!(login = %prev.login, "duplicate login in member listing; keeping the later record");
        }
        previous
    }

    pub fn get_mut(&mut self, login: &str) -> Option<&mut Member> {
        self.by_login.get_mut(login)
    }

    pub fn len(&self) -> usize {
        self.by_login.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_login.is_empty()
    }

    pub fn into_vec(self) -> Vec<Member> {
        self.by_login.into_values().collect()
    }
}

impl FromIterator<Member> for Members {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        let mut members = Members::new();
        for member in iter {
            members.insert(member);
        }
        members
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub login: String,
    pub permission: String,
}

impl Collaborator {
    pub fn new(login: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            permission: permission.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub is_archived: bool,
    pub collaborators: Vec<Collaborator>,
}

impl Repository {
    /// Heading used for this repository's CSV column.
    pub fn display_name(&self) -> String {
        if self.is_archived {
            format!("{}{ARCHIVED_SUFFIX}", self.name)
        } else {
            self.name.clone()
        }
    }
}
