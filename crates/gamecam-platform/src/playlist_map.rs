//! The in-process playlist map the Upload Processor consults before falling
//! back to an NTFY prompt (§4.5).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PlaylistMap {
    by_team: HashMap<String, String>,
}

impl PlaylistMap {
    pub fn new(by_team: HashMap<String, String>) -> Self {
        Self { by_team }
    }

    pub fn get(&self, team_name: &str) -> Option<&str> {
        self.by_team.get(team_name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_team_returns_none() {
        let map = PlaylistMap::default();
        assert!(map.get("Sharks").is_none());
    }

    #[test]
    fn known_team_resolves() {
        let mut by_team = HashMap::new();
        by_team.insert("Sharks".to_string(), "Sharks 2024".to_string());
        let map = PlaylistMap::new(by_team);
        assert_eq!(map.get("Sharks"), Some("Sharks 2024"));
    }
}
