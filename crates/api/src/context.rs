use crate::auth::Permission;

/// Principal context for a request (authenticated identity + permissions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: String,
    permissions: Vec<Permission>,
}

impl PrincipalContext {
    pub fn new(principal_id: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            principal_id: principal_id.into(),
            permissions,
        }
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p.as_str() == permission)
    }
}
