use ssh2_config::{ParseRule, SshConfig};
use whoami::username;

use crate::ConnectionRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshConfigItem {
    pub host: String,
    pub user: String,
    pub hostname: String,
}

impl SshConfigItem {
    /// A request for the alias, leaving user and port to the ssh config.
    pub fn request(&self, account: Option<&str>, terminal: Option<&str>) -> ConnectionRequest {
        ConnectionRequest {
            account: account.map(str::to_string),
            terminal: terminal.map(str::to_string),
            ..ConnectionRequest::for_alias(&self.host)
        }
    }
}

/// Aliases from `~/.ssh/config` that name a concrete host.
pub fn retrive_ssh_configs() -> anyhow::Result<Vec<SshConfigItem>> {
    let config = SshConfig::parse_default_file(ParseRule::ALLOW_UNKNOWN_FIELDS)?;

    let mut datas = Vec::new();
    for host in config.get_hosts() {
        // if hostname is not set, we can't connect to it
        if let Some(hostname) = host.params.host_name.clone() {
            // if user is not set, we use the current user
            let user = host.params.user.clone().unwrap_or_else(username);

            for alias in host.pattern.iter() {
                if !is_concrete(&alias.pattern) {
                    continue;
                }
                datas.push(SshConfigItem {
                    host: alias.pattern.clone(),
                    user: user.clone(),
                    hostname: hostname.clone(),
                });
            }
        }
    }

    Ok(datas)
}

fn is_concrete(pattern: &str) -> bool {
    !pattern.is_empty() && !pattern.contains(['*', '?', '!'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_not_aliases() {
        assert!(is_concrete("prod-db"));
        assert!(!is_concrete("*"));
        assert!(!is_concrete("web-?"));
        assert!(!is_concrete("!bastion"));
    }

    #[test]
    fn item_becomes_request() {
        let item = SshConfigItem {
            host: "prod".to_string(),
            user: "deploy".to_string(),
            hostname: "10.0.0.5".to_string(),
        };

        let request = item.request(Some("ops"), None);
        assert_eq!(request.to_url(), "sshconnect://prod?account=ops");
        assert_eq!(request.user, None);
    }
}
