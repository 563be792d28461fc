use std::str::FromStr;

use poem::Request;
use poem_openapi::auth::Bearer;
use poem_openapi::SecurityScheme;

use crate::model::{AccountId, Role, Token, TokenSecret};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAuthorisation {
    pub token: Token,
    pub roles: Vec<Role>,
}

impl AccountAuthorisation {
    pub fn new(token: Token, roles: Vec<Role>) -> Self {
        Self { token, roles }
    }

    pub fn admin() -> Self {
        Self {
            token: Token::admin(),
            roles: Role::all(),
        }
    }

    pub fn account_id(&self) -> AccountId {
        self.token.account_id
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn has_admin(&self) -> bool {
        self.has_role(&Role::Admin)
    }

    pub fn has_account(&self, account_id: &AccountId) -> bool {
        &self.token.account_id == account_id
    }

    pub fn has_account_or_admin(&self, account_id: &AccountId) -> bool {
        self.has_account(account_id) || self.has_admin()
    }
}

/// Bearer token protecting the authenticated API surface.
#[derive(SecurityScheme)]
#[oai(ty = "bearer", checker = "parse_token_secret")]
pub struct ForgeSecurityScheme(TokenSecret);

async fn parse_token_secret(_req: &Request, bearer: Bearer) -> Option<TokenSecret> {
    TokenSecret::from_str(&bearer.token).ok()
}

impl AsRef<TokenSecret> for ForgeSecurityScheme {
    fn as_ref(&self) -> &TokenSecret {
        &self.0
    }
}
