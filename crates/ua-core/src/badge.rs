//! Toolbar badge presentation for the active profile

use crate::types::{UserAgentProfile, DEFAULT_BADGE_BG_COLOR};

/// What the toolbar button should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeState {
    /// Empty when the browser default is active
    pub text: String,
    /// `None` leaves the current colour untouched
    pub background_color: Option<String>,
    pub title: String,
}

impl BadgeState {
    /// Badge for the active profile. An unknown active id shows nothing.
    pub fn for_profile(profile: Option<&UserAgentProfile>) -> Self {
        match profile {
            Some(profile) if profile.is_default() => Self {
                text: String::new(),
                background_color: None,
                title: title_for(&profile.name),
            },
            Some(profile) => {
                let color = if profile.badge_bg_color.is_empty() {
                    DEFAULT_BADGE_BG_COLOR.to_string()
                } else {
                    profile.badge_bg_color.clone()
                };
                Self {
                    text: profile.alias.clone(),
                    background_color: Some(color),
                    title: title_for(&profile.name),
                }
            }
            None => Self {
                text: String::new(),
                background_color: None,
                title: "User-Agent Changer".to_string(),
            },
        }
    }
}

fn title_for(name: &str) -> String {
    format!("User-Agent Changer\nActive: {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_user_agents;

    #[test]
    fn test_default_profile_has_no_badge_text() {
        let profiles = default_user_agents();
        let badge = BadgeState::for_profile(profiles.first());
        assert!(badge.text.is_empty());
        assert_eq!(badge.background_color, None);
        assert_eq!(badge.title, "User-Agent Changer\nActive: Default (Chrome)");
    }

    #[test]
    fn test_custom_profile_uses_alias_and_color() {
        let profiles = default_user_agents();
        let badge = BadgeState::for_profile(profiles.get(2));
        assert_eq!(badge.text, "AND");
        assert_eq!(badge.background_color.as_deref(), Some("#34a853"));
    }

    #[test]
    fn test_empty_color_falls_back() {
        let mut profile = default_user_agents().remove(1);
        profile.badge_bg_color.clear();
        let badge = BadgeState::for_profile(Some(&profile));
        assert_eq!(badge.background_color.as_deref(), Some(DEFAULT_BADGE_BG_COLOR));
    }
}
