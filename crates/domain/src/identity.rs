use serde::{Deserialize, Serialize};

use crate::value_objects::Username;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// 一条连接在整个生命周期内携带的已验证身份。
///
/// 由令牌验证器签发，核心只读，不负责持久化；角色在连接存续期间不变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Username,
    pub role: Role,
}

impl Identity {
    pub fn new(username: Username, role: Role) -> Self {
        Self { username, role }
    }
}
