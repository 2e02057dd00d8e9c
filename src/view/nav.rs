use crate::routes::Route;

#[derive(Debug, Clone, PartialEq)]
pub struct NavItem {
    pub route: Route,
    pub label: &'static str,
    pub icon: &'static str,
}

impl NavItem {
    pub fn is_active(&self, current: &Route) -> bool {
        &self.route == current
    }
}

/// Rail entries, top to bottom. Settings is pinned separately at the bottom.
pub fn nav_items() -> Vec<NavItem> {
    vec![
        NavItem { route: Route::Dashboard, label: "Home", icon: "user-home-symbolic" },
        NavItem { route: Route::Chats, label: "Chats", icon: "mail-unread-symbolic" },
        NavItem { route: Route::Contacts, label: "Contacts", icon: "system-users-symbolic" },
        NavItem { route: Route::Analytics, label: "Analytics", icon: "utilities-system-monitor-symbolic" },
        NavItem { route: Route::Files, label: "Files", icon: "folder-symbolic" },
        NavItem { route: Route::Calls, label: "Calls", icon: "call-start-symbolic" },
        NavItem { route: Route::Archive, label: "Archive", icon: "package-x-generic-symbolic" },
    ]
}

pub fn settings_item() -> NavItem {
    NavItem { route: Route::Settings, label: "Settings", icon: "emblem-system-symbolic" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_current_route_is_active() {
        let active: Vec<&str> = nav_items()
            .iter()
            .filter(|i| i.is_active(&Route::Chats))
            .map(|i| i.label)
            .collect();
        assert_eq!(active, vec!["Chats"]);
        assert!(!settings_item().is_active(&Route::Chats));
    }
}
