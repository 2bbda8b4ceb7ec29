//! Account record held under the `user` store key.
//!
//! Token issuance and refresh happen outside this engine; the token is an
//! opaque bearer credential used to authenticate the sync surfaces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserAccount {
    pub is_pro: bool,
    pub auth_token: Option<String>,
}

impl UserAccount {
    /// Bearer token when the account may use the sync layer.
    pub fn sync_token(&self) -> Option<&str> {
        if self.is_pro {
            self.auth_token.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_account_is_not_eligible() {
        let account = UserAccount {
            is_pro: false,
            auth_token: Some("tok".into()),
        };
        assert!(account.sync_token().is_none());
    }

    #[test]
    fn pro_without_token_is_not_eligible() {
        let account = UserAccount {
            is_pro: true,
            auth_token: None,
        };
        assert!(account.sync_token().is_none());
    }

    #[test]
    fn pro_with_token_is_eligible() {
        let account = UserAccount {
            is_pro: true,
            auth_token: Some("tok".into()),
        };
        assert_eq!(account.sync_token(), Some("tok"));
    }
}
