use super::ports::{AuthError, AuthorizationProvider};
use config::AuthorizationSource;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};
use tracing::{error, info, warn};

/// Lets every authenticated user in.
#[derive(Debug, Default)]
pub struct AllowAllProvider;

impl AuthorizationProvider for AllowAllProvider {
    fn name(&self) -> &'static str {
        "allow-all"
    }

    fn is_authorized(&self, _email: &str) -> bool {
        true
    }

    fn list_authorized(&self) -> BTreeSet<String> {
        BTreeSet::from(["*".to_string()])
    }
}

/// Fixed allow-list parsed once from a comma-separated string.
#[derive(Debug)]
pub struct EnvironmentProvider {
    emails: BTreeSet<String>,
}

impl EnvironmentProvider {
    pub fn from_list(raw: &str) -> Self {
        let emails = raw
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        Self { emails }
    }
}

impl AuthorizationProvider for EnvironmentProvider {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn is_authorized(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    fn list_authorized(&self) -> BTreeSet<String> {
        self.emails.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AllowListFile {
    #[serde(default)]
    authorized_users: Option<Vec<AllowListEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AllowListEntry {
    Email(String),
    Detailed { email: Option<String> },
}

impl AllowListEntry {
    fn email(&self) -> Option<&str> {
        match self {
            Self::Email(email) => Some(email),
            Self::Detailed { email } => email.as_deref(),
        }
    }
}

/// Allow-list backed by a YAML file, reloadable at runtime.
#[derive(Debug)]
pub struct YamlFileProvider {
    path: PathBuf,
    emails: RwLock<BTreeSet<String>>,
}

impl YamlFileProvider {
    /// Load `path`. An unreadable file yields an empty list rather than an error.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let emails = match read_allow_list(&path) {
            Ok(emails) => emails,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to load authorized users");
                BTreeSet::new()
            }
        };
        info!(path = %path.display(), count = emails.len(), "Loaded authorized users");

        Self {
            path,
            emails: RwLock::new(emails),
        }
    }

    fn snapshot(&self) -> BTreeSet<String> {
        match self.emails.read() {
            Ok(emails) => emails.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn read_allow_list(path: &Path) -> Result<BTreeSet<String>, AuthError> {
    if !path.exists() {
        warn!(path = %path.display(), "Authorized users file not found");
        return Ok(BTreeSet::new());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| AuthError::AllowListLoad(format!("{}: {e}", path.display())))?;

    if content.trim().is_empty() {
        warn!(path = %path.display(), "Authorized users file is empty");
        return Ok(BTreeSet::new());
    }

    let file: Option<AllowListFile> = serde_yaml::from_str(&content)
        .map_err(|e| AuthError::AllowListLoad(format!("{}: {e}", path.display())))?;

    let Some(entries) = file.and_then(|f| f.authorized_users) else {
        warn!(path = %path.display(), "No authorized_users key in file");
        return Ok(BTreeSet::new());
    };

    Ok(entries
        .iter()
        .filter_map(AllowListEntry::email)
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect())
}

impl AuthorizationProvider for YamlFileProvider {
    fn name(&self) -> &'static str {
        "yaml-file"
    }

    fn is_authorized(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        match self.emails.read() {
            Ok(emails) => emails.contains(&email),
            Err(poisoned) => poisoned.into_inner().contains(&email),
        }
    }

    fn list_authorized(&self) -> BTreeSet<String> {
        self.snapshot()
    }

    /// Swap in the file's current contents; on failure the old list stays.
    fn reload(&self) -> Result<usize, AuthError> {
        let fresh = read_allow_list(&self.path)?;
        let count = fresh.len();
        match self.emails.write() {
            Ok(mut emails) => *emails = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        info!(path = %self.path.display(), count, "Reloaded authorized users");
        Ok(count)
    }
}

/// Build the provider for a resolved source.
pub fn provider_for(source: &AuthorizationSource) -> Arc<dyn AuthorizationProvider> {
    let provider: Arc<dyn AuthorizationProvider> = match source {
        AuthorizationSource::EnvList(raw) => Arc::new(EnvironmentProvider::from_list(raw)),
        AuthorizationSource::File(path) => Arc::new(YamlFileProvider::new(path.clone())),
        AuthorizationSource::AllowAll => Arc::new(AllowAllProvider),
    };
    info!(provider = provider.name(), "Authorization provider selected");
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_allow_all_admits_anything() {
        let provider = AllowAllProvider;
        assert!(provider.is_authorized(""));
        assert!(provider.is_authorized("anyone@anywhere.test"));
        assert_eq!(
            provider.list_authorized().into_iter().collect::<Vec<_>>(),
            vec!["*"]
        );
    }

    #[test]
    fn test_environment_list_is_case_insensitive() {
        let provider = EnvironmentProvider::from_list(" Alice@Example.com , bob@example.com,,");
        assert!(provider.is_authorized("alice@example.com"));
        assert!(provider.is_authorized("ALICE@EXAMPLE.COM"));
        assert!(provider.is_authorized("Bob@Example.Com"));
        assert!(!provider.is_authorized("carol@example.com"));
        assert!(!provider.is_authorized(""));
        assert_eq!(
            provider.list_authorized().into_iter().collect::<Vec<_>>(),
            vec!["alice@example.com", "bob@example.com"]
        );
    }

    #[test]
    fn test_yaml_accepts_strings_and_mappings() {
        let file = yaml_file(
            r#"
authorized_users:
  - Alice@Example.com
  - email: bob@example.com
    name: Bob
  - name: no-email-here
"#,
        );
        let provider = YamlFileProvider::new(file.path());

        assert!(provider.is_authorized("alice@example.com"));
        assert!(provider.is_authorized("BOB@example.com"));
        assert_eq!(provider.list_authorized().len(), 2);
    }

    #[test]
    fn test_yaml_missing_or_empty_file_denies_everyone() {
        let provider = YamlFileProvider::new("/nonexistent/authorized_users.yaml");
        assert!(!provider.is_authorized("alice@example.com"));
        assert!(provider.list_authorized().is_empty());

        let empty = yaml_file("");
        let provider = YamlFileProvider::new(empty.path());
        assert!(provider.list_authorized().is_empty());

        let no_key = yaml_file("other: value\n");
        let provider = YamlFileProvider::new(no_key.path());
        assert!(provider.list_authorized().is_empty());
    }

    #[test]
    fn test_yaml_reload_picks_up_changes() {
        let file = yaml_file("authorized_users:\n  - alice@example.com\n");
        let provider = YamlFileProvider::new(file.path());
        assert!(!provider.is_authorized("bob@example.com"));

        std::fs::write(
            file.path(),
            "authorized_users:\n  - alice@example.com\n  - bob@example.com\n",
        )
        .unwrap();
        assert_eq!(provider.reload().unwrap(), 2);
        assert!(provider.is_authorized("bob@example.com"));
    }

    #[test]
    fn test_yaml_failed_reload_keeps_previous_list() {
        let file = yaml_file("authorized_users:\n  - alice@example.com\n");
        let provider = YamlFileProvider::new(file.path());

        std::fs::write(file.path(), "authorized_users: [unterminated\n").unwrap();
        assert!(provider.reload().is_err());
        assert!(provider.is_authorized("alice@example.com"));
    }

    #[test]
    fn test_provider_for_each_source() {
        let env = provider_for(&AuthorizationSource::EnvList("a@example.com".to_string()));
        assert_eq!(env.name(), "environment");
        assert!(!env.is_authorized("b@example.com"));

        let file = yaml_file("authorized_users:\n  - a@example.com\n");
        let yaml = provider_for(&AuthorizationSource::File(file.path().to_path_buf()));
        assert_eq!(yaml.name(), "yaml-file");
        assert!(yaml.is_authorized("a@example.com"));

        let all = provider_for(&AuthorizationSource::AllowAll);
        assert_eq!(all.name(), "allow-all");
        assert!(all.is_authorized("b@example.com"));
    }
}
