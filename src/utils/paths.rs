use std::env;
use std::path::PathBuf;

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

pub fn env_string(key: &str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(trimmed.to_string())
}

fn resolve_home_dir() -> Option<PathBuf> {
    env::var("HOME").ok().map(PathBuf::from)
}

fn resolve_xdg_state_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_STATE_HOME").ok()) {
        return Some(path);
    }
    resolve_home_dir().map(|home| home.join(".local").join("state"))
}

pub fn resolve_state_base_dir() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("RELAY_STATE_DIR").ok()) {
        return path;
    }
    if let Some(path) = resolve_xdg_state_dir() {
        return path.join("relay");
    }
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Destination directory for materialized downloads. Scoped with a
/// per-organization subdirectory when an org context is set. The caller
/// creates the directory; this only resolves it.
pub fn resolve_download_dir(org_id: Option<&str>) -> PathBuf {
    let base = normalize_env_path(env::var("RELAY_DOWNLOAD_DIR").ok())
        .unwrap_or_else(|| resolve_state_base_dir().join("downloads"));
    match org_id {
        Some(org) if !org.trim().is_empty() => base.join(org.trim()),
        _ => base,
    }
}

/// Organization context: an explicit argument wins over the environment.
pub fn resolve_org_id(explicit: Option<&str>) -> Option<String> {
    if let Some(org) = explicit {
        let trimmed = org.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    env_string("RELAY_ORG_ID")
}

#[cfg(test)]
mod tests {
    use super::resolve_download_dir;

    #[test]
    fn org_scope_appends_a_subdirectory() {
        let plain = resolve_download_dir(None);
        let scoped = resolve_download_dir(Some("acme"));
        assert_eq!(scoped, plain.join("acme"));
        assert_eq!(resolve_download_dir(Some("  ")), plain);
    }
}
