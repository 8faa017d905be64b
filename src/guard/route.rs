//! Classification of protected dashboard paths.

/// Which dashboard a path belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardScope {
    /// `/dashboard` and everything below it
    Platform,
    /// `/r/<slug>/dashboard[/...]`
    Tenant { slug: String },
    /// `/r/<slug>/<role>/dashboard[/...]`
    TenantRole { slug: String, role: String },
}

impl DashboardScope {
    /// Classify a request path. Returns `None` for unprotected paths.
    pub fn from_path(path: &str) -> Option<Self> {
        let rest = path.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();

        match segments.as_slice() {
            ["dashboard", ..] => Some(DashboardScope::Platform),
            ["r", slug, "dashboard", ..] if !slug.is_empty() => Some(DashboardScope::Tenant {
                slug: (*slug).to_string(),
            }),
            ["r", slug, role, "dashboard", ..] if !slug.is_empty() && !role.is_empty() => {
                Some(DashboardScope::TenantRole {
                    slug: (*slug).to_string(),
                    role: (*role).to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn tenant_slug(&self) -> Option<&str> {
        match self {
            DashboardScope::Platform => None,
            DashboardScope::Tenant { slug } | DashboardScope::TenantRole { slug, .. } => Some(slug),
        }
    }

    /// Base path the scope's login and dashboard pages hang off.
    fn prefix(&self) -> String {
        match self {
            DashboardScope::Platform => String::new(),
            DashboardScope::Tenant { slug } => format!("/r/{}", slug),
            DashboardScope::TenantRole { slug, role } => format!("/r/{}/{}", slug, role),
        }
    }

    pub fn login_path(&self) -> String {
        format!("{}/login", self.prefix())
    }

    /// Where to land after login when no `from` was given.
    pub fn default_landing(&self) -> String {
        format!("{}/dashboard/overview", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(slug: &str) -> DashboardScope {
        DashboardScope::Tenant { slug: slug.into() }
    }

    #[test]
    fn test_platform_paths() {
        assert_eq!(
            DashboardScope::from_path("/dashboard"),
            Some(DashboardScope::Platform)
        );
        assert_eq!(
            DashboardScope::from_path("/dashboard/menu"),
            Some(DashboardScope::Platform)
        );
        assert_eq!(DashboardScope::from_path("/dashboards"), None);
    }

    #[test]
    fn test_tenant_paths() {
        assert_eq!(DashboardScope::from_path("/r/bella/dashboard"), Some(tenant("bella")));
        assert_eq!(
            DashboardScope::from_path("/r/bella/dashboard/orders/42"),
            Some(tenant("bella"))
        );
        // A nested "dashboard" page under the tenant dashboard is still tenant scope
        assert_eq!(
            DashboardScope::from_path("/r/bella/dashboard/dashboard"),
            Some(tenant("bella"))
        );
    }

    #[test]
    fn test_tenant_role_paths() {
        assert_eq!(
            DashboardScope::from_path("/r/bella/manager/dashboard/users"),
            Some(DashboardScope::TenantRole {
                slug: "bella".into(),
                role: "manager".into()
            })
        );
    }

    #[test]
    fn test_unprotected_paths() {
        for path in [
            "/",
            "/login",
            "/r/bella",
            "/r/bella/menu",
            "/r/bella/login",
            "/r//dashboard",
            "/r/bella/a/b/dashboard",
            "/api/admin/menu",
            "",
        ] {
            assert_eq!(DashboardScope::from_path(path), None, "{}", path);
        }
    }

    #[test]
    fn test_login_paths() {
        assert_eq!(DashboardScope::Platform.login_path(), "/login");
        assert_eq!(tenant("bella").login_path(), "/r/bella/login");
        assert_eq!(
            DashboardScope::TenantRole {
                slug: "bella".into(),
                role: "staff".into()
            }
            .login_path(),
            "/r/bella/staff/login"
        );
    }

    #[test]
    fn test_default_landing() {
        assert_eq!(
            DashboardScope::Platform.default_landing(),
            "/dashboard/overview"
        );
        assert_eq!(
            tenant("bella").default_landing(),
            "/r/bella/dashboard/overview"
        );
    }
}
