use git_version::git_version;
use serde::Serialize;

// include -modified if the working tree has uncommitted changes
const COMMIT: &str = git_version!(
    args = ["--abbrev=10", "--always", "--dirty=-modified"],
    fallback = "unknown"
);

/// Build metadata reported by the health endpoint and at startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub name: &'static str,
    pub version: String,
    pub commit: &'static str,
    pub profile: &'static str,
}

impl SystemInfo {
    pub fn current() -> Self {
        let profile = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: describe_version(
                option_env!("RELEASE_VERSION").unwrap_or(""),
                option_env!("LATEST_TAG").unwrap_or(""),
                option_env!("COMMITS_AHEAD").unwrap_or(""),
            ),
            commit: COMMIT,
            profile,
        }
    }
}

fn describe_version(release: &str, latest: &str, ahead: &str) -> String {
    match (release, latest, ahead) {
        (tag, _, _) if !tag.is_empty() => format!("release {tag}"),
        ("", latest, ahead) if !latest.is_empty() && !ahead.is_empty() => {
            format!("{} {ahead} commits ahead of {latest}", env!("CARGO_PKG_VERSION"))
        }
        ("", latest, _) if !latest.is_empty() => {
            format!("{} ahead of {latest}", env!("CARGO_PKG_VERSION"))
        }
        _ => format!("{} development", env!("CARGO_PKG_VERSION")),
    }
}

pub fn get_system_info() -> String {
    let info = SystemInfo::current();
    format!(
        "{} {} (commit {}, {} build)",
        info.name, info.version, info.commit, info.profile
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_prefers_release_tag() {
        assert_eq!(describe_version("v1.2.0", "v1.1.0", "3"), "release v1.2.0");
        assert_eq!(
            describe_version("", "v1.1.0", "3"),
            format!("{} 3 commits ahead of v1.1.0", env!("CARGO_PKG_VERSION"))
        );
        assert_eq!(
            describe_version("", "", ""),
            format!("{} development", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn summary_names_crate_and_profile() {
        let info = get_system_info();
        assert!(info.starts_with("promptdeck "));
        assert!(info.contains(COMMIT));
        assert!(info.contains("dev build") || info.contains("release build"));
    }
}
