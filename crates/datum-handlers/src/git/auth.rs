//! Credentials for git remotes, taken from the environment
//!
//! | transport | source |
//! |---|---|
//! | HTTPS | `GIT_TOKEN` (sent as `x-access-token`), else `GIT_USERNAME` / `GIT_PASSWORD` |
//! | SSH | the SSH agent, then `GIT_SSH_KEY` with optional `GIT_SSH_PASSPHRASE` |

use std::path::PathBuf;

use git2::{Cred, CredentialType};

/// Username sent with a `GIT_TOKEN`.
const TOKEN_USER: &str = "x-access-token";

/// Give up after this many rejected credentials for one operation.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitAuth {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub ssh_passphrase: Option<String>,
}

/// What to answer a credential request with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CredentialPlan {
    UserPass { username: String, password: String },
    SshAgent { username: String },
    SshKey { username: String, key: PathBuf, passphrase: Option<String> },
    Username(String),
    Default,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl GitAuth {
    pub fn from_env() -> Self {
        Self {
            token: env("GIT_TOKEN"),
            username: env("GIT_USERNAME"),
            password: env("GIT_PASSWORD"),
            ssh_key: env("GIT_SSH_KEY").map(PathBuf::from),
            ssh_passphrase: env("GIT_SSH_PASSPHRASE"),
        }
    }

    /// Decide how to answer the `attempt`-th (1-based) credential request.
    pub(crate) fn plan(
        &self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
        attempt: usize,
    ) -> Option<CredentialPlan> {
        let ssh_user = username_from_url.unwrap_or("git").to_string();

        if allowed.contains(CredentialType::USERNAME) {
            return Some(CredentialPlan::Username(ssh_user));
        }
        if attempt > MAX_ATTEMPTS {
            return None;
        }

        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) && attempt == 1 {
            if let Some(token) = &self.token {
                return Some(CredentialPlan::UserPass {
                    username: TOKEN_USER.to_string(),
                    password: token.clone(),
                });
            }
            if self.username.is_some() || self.password.is_some() {
                return Some(CredentialPlan::UserPass {
                    username: self.username.clone().unwrap_or_default(),
                    password: self.password.clone().unwrap_or_default(),
                });
            }
        }

        if allowed.contains(CredentialType::SSH_KEY) {
            match (attempt, &self.ssh_key) {
                (1, _) => return Some(CredentialPlan::SshAgent { username: ssh_user }),
                (2, Some(key)) => {
                    return Some(CredentialPlan::SshKey {
                        username: ssh_user,
                        key: key.clone(),
                        passphrase: self.ssh_passphrase.clone(),
                    });
                }
                _ => {}
            }
        }

        if allowed.contains(CredentialType::DEFAULT) && attempt == 1 {
            return Some(CredentialPlan::Default);
        }
        None
    }

    /// Answer a libgit2 credential request.
    pub(crate) fn credentials(
        &self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
        attempt: usize,
    ) -> Result<Cred, git2::Error> {
        let plan = self
            .plan(username_from_url, allowed, attempt)
            .ok_or_else(|| git2::Error::from_str("no usable git credentials"))?;
        tracing::debug!(attempt, plan = plan.kind(), "Supplying git credentials");
        match plan {
            CredentialPlan::UserPass { username, password } => {
                Cred::userpass_plaintext(&username, &password)
            }
            CredentialPlan::SshAgent { username } => Cred::ssh_key_from_agent(&username),
            CredentialPlan::SshKey {
                username,
                key,
                passphrase,
            } => Cred::ssh_key(&username, None, &key, passphrase.as_deref()),
            CredentialPlan::Username(username) => Cred::username(&username),
            CredentialPlan::Default => Cred::default(),
        }
    }
}

impl CredentialPlan {
    fn kind(&self) -> &'static str {
        match self {
            CredentialPlan::UserPass { .. } => "userpass",
            CredentialPlan::SshAgent { .. } => "ssh-agent",
            CredentialPlan::SshKey { .. } => "ssh-key",
            CredentialPlan::Username(_) => "username",
            CredentialPlan::Default => "default",
        }
    }
}
