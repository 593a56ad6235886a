//! AstDB actions: `DBGet`, `DBPut`, `DBDel`, `DBDelTree`.

use crate::action::{AmiAction, ResponseCompletion};

/// Read `family/key`. The value arrives in a `DBGetResponse` event (`Val` header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbGet {
    pub family: String,
    pub key: String,
}

impl DbGet {
    pub fn new(family: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            key: key.into(),
        }
    }
}

impl From<DbGet> for AmiAction {
    fn from(get: DbGet) -> Self {
        AmiAction::new("DBGet")
            .header("Family", get.family)
            .header("Key", get.key)
            .completion(ResponseCompletion::EventList {
                terminator: Some("DBGetResponse"),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPut {
    pub family: String,
    pub key: String,
    pub value: String,
}

impl DbPut {
    pub fn new(
        family: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            family: family.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

impl From<DbPut> for AmiAction {
    fn from(put: DbPut) -> Self {
        AmiAction::new("DBPut")
            .header("Family", put.family)
            .header("Key", put.key)
            .header("Val", put.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbDel {
    pub family: String,
    pub key: String,
}

impl DbDel {
    pub fn new(family: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            key: key.into(),
        }
    }
}

impl From<DbDel> for AmiAction {
    fn from(del: DbDel) -> Self {
        AmiAction::new("DBDel")
            .header("Family", del.family)
            .header("Key", del.key)
    }
}

/// Delete a whole family, or the subtree under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbDelTree {
    pub family: String,
    pub key: Option<String>,
}

impl From<DbDelTree> for AmiAction {
    fn from(del: DbDelTree) -> Self {
        AmiAction::new("DBDelTree")
            .header("Family", del.family)
            .opt_header("Key", del.key)
    }
}
