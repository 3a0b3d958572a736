use anyhow::{anyhow, Result};

/// Opaque tenant handle supplied by the subscription runtime: an
/// isolated registry namespace plus the credentials to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl Tenant {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Boundary to the multi-tenancy runtime: yields the currently active
/// tenants as a sequence. Consumers handle per-tenant failures
/// themselves; enumeration never aborts on one bad tenant.
pub trait Subscriptions: Send + Sync {
    fn active_tenants(&self) -> Vec<Tenant>;
}

/// Subscription directory parsed once at startup from the environment.
/// Stands in for the platform subscription service, which is an
/// external collaborator.
#[derive(Debug, Clone)]
pub struct EnvSubscriptions {
    tenants: Vec<Tenant>,
}

impl EnvSubscriptions {
    pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
        Self { tenants }
    }

    /// Parses a comma-separated list of `id:username:password` entries,
    /// the format of the `TEMPSIM_TENANTS` environment variable.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let mut tenants = Vec::new();

        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(username), Some(password))
                    if !id.is_empty() && !username.is_empty() =>
                {
                    tenants.push(Tenant::new(id, username, password));
                }
                _ => {
                    return Err(anyhow!(
                        "Invalid tenant entry '{}', expected id:username:password",
                        entry
                    ));
                }
            }
        }

        if tenants.is_empty() {
            return Err(anyhow!("Tenant directory is empty"));
        }

        Ok(Self { tenants })
    }
}

impl Subscriptions for EnvSubscriptions {
    fn active_tenants(&self) -> Vec<Tenant> {
        self.tenants.clone()
    }
}
