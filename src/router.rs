//! Maps the URL fragment onto the view being rendered.
//!
//! The router never fetches anything. It only picks which of the already
//! fetched module views is visible.

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::modules::ModuleKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    #[default]
    Overview,
    Module(ModuleKind),
    CommandsCustom,
    CommandsDefault,
    AutomodFilters,
    AutomodWhitelist,
}

impl Route {
    /// Parse a fragment such as `#/claimtime` or `commands/custom`.
    /// Anything unrecognised is the overview.
    pub fn from_fragment(fragment: &str) -> Self {
        let path = fragment
            .trim()
            .trim_start_matches('#')
            .trim_matches('/')
            .to_ascii_lowercase();

        match path.as_str() {
            "" | "overview" | "dashboard" => Route::Overview,
            "commands/custom" => Route::CommandsCustom,
            "commands/default" => Route::CommandsDefault,
            "automod/filters" => Route::AutomodFilters,
            "automod/whitelist" => Route::AutomodWhitelist,
            token => ModuleKind::from_token(token)
                .map(Route::Module)
                .unwrap_or(Route::Overview),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Overview => "overview",
            Route::Module(kind) => kind.token(),
            Route::CommandsCustom => "commands/custom",
            Route::CommandsDefault => "commands/default",
            Route::AutomodFilters => "automod/filters",
            Route::AutomodWhitelist => "automod/whitelist",
        }
    }

    pub fn fragment(&self) -> String {
        format!("#/{}", self.path())
    }

    /// Module whose editor this route shows. Sub-pages belong to their parent.
    pub fn module(&self) -> Option<ModuleKind> {
        match self {
            Route::Overview => None,
            Route::Module(kind) => Some(*kind),
            Route::CommandsCustom | Route::CommandsDefault => Some(ModuleKind::Commands),
            Route::AutomodFilters | Route::AutomodWhitelist => Some(ModuleKind::Automod),
        }
    }

    /// Nested pages of a module with two-level navigation
    pub fn sub_pages(kind: ModuleKind) -> &'static [Route] {
        match kind {
            ModuleKind::Commands => &[Route::CommandsCustom, Route::CommandsDefault],
            ModuleKind::Automod => &[Route::AutomodFilters, Route::AutomodWhitelist],
            _ => &[],
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}

#[derive(Debug, Default)]
pub struct FragmentRouter {
    current: Route,
}

impl FragmentRouter {
    /// Initial state from the fragment present at mount
    pub fn new(fragment: Option<&str>) -> Self {
        Self {
            current: fragment.map(Route::from_fragment).unwrap_or_default(),
        }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    pub fn fragment(&self) -> String {
        self.current.fragment()
    }

    /// Follow a fragment change. There is no guard; unknown values land on the overview.
    pub fn navigate(&mut self, fragment: &str) -> Route {
        let route = Route::from_fragment(fragment);
        if route != self.current {
            debug!("Route {} -> {}", self.current, route);
        }
        self.current = route;
        route
    }

    /// Module views are guild specific, so a guild switch goes back to the overview
    pub fn reset_for_guild_switch(&mut self) -> String {
        self.current = Route::Overview;
        self.fragment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claimtime_fragment() {
        assert_eq!(
            Route::from_fragment("#/claimtime"),
            Route::Module(ModuleKind::ClaimTime)
        );
        assert_eq!(
            Route::from_fragment("#/claimTime"),
            Route::Module(ModuleKind::ClaimTime)
        );
    }

    #[test]
    fn test_unknown_or_absent_fragment_is_overview() {
        assert_eq!(Route::from_fragment("#/bogus"), Route::Overview);
        assert_eq!(Route::from_fragment(""), Route::Overview);
        assert_eq!(Route::from_fragment("#"), Route::Overview);
        assert_eq!(Route::from_fragment("#/commands/bogus"), Route::Overview);
        assert_eq!(FragmentRouter::new(None).current(), Route::Overview);
    }

    #[test]
    fn test_sub_pages() {
        assert_eq!(Route::from_fragment("#/commands/custom"), Route::CommandsCustom);
        assert_eq!(Route::from_fragment("#/automod/whitelist/"), Route::AutomodWhitelist);
        assert_eq!(Route::CommandsDefault.module(), Some(ModuleKind::Commands));
        assert_eq!(Route::AutomodFilters.module(), Some(ModuleKind::Automod));
        assert!(Route::sub_pages(ModuleKind::Logging).is_empty());
    }

    #[test]
    fn test_every_module_fragment_parses_back() {
        for kind in ModuleKind::ALL {
            let route = Route::Module(kind);
            assert_eq!(Route::from_fragment(&route.fragment()), route);
        }
    }

    #[test]
    fn test_navigation_and_guild_switch_reset() {
        let mut router = FragmentRouter::new(Some("#/tickets"));
        assert_eq!(router.current(), Route::Module(ModuleKind::Tickets));

        assert_eq!(router.navigate("#/logging"), Route::Module(ModuleKind::Logging));
        assert_eq!(router.fragment(), "#/logging");

        assert_eq!(router.reset_for_guild_switch(), "#/overview");
        assert_eq!(router.current(), Route::Overview);
    }

    #[test]
    fn test_route_serializes_as_path() {
        let json = serde_json::to_string(&Route::CommandsCustom).unwrap();
        assert_eq!(json, "\"commands/custom\"");
    }
}
