use serde::Serialize;

/// Data roles exposed for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum Role {
    Uri = 33,
    FileName = 34,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Uri, Role::FileName];

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.id() == id)
    }

    pub fn id(self) -> i32 {
        self as i32
    }

    /// Name used by views to bind the role.
    pub fn name(self) -> &'static str {
        match self {
            Self::Uri => "uri",
            Self::FileName => "fileName",
        }
    }
}

/// `(id, name)` table for every role.
pub fn role_names() -> Vec<(i32, &'static str)> {
    Role::ALL
        .into_iter()
        .map(|role| (role.id(), role.name()))
        .collect()
}
