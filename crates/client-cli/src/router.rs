use std::sync::Arc;

use shared::{PushKind, PushPayload};

use crate::screen::{Navigator, Screen};

/// What happened to a routed push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Navigated(Screen),
    /// Recognized, but nothing is mounted to navigate. Not queued.
    NotNavigable(Screen),
    Ignored,
}

/// Maps incoming push types to the screen that shows them
pub struct NotificationRouter {
    navigator: Arc<Navigator>,
}

impl NotificationRouter {
    pub fn new(navigator: Arc<Navigator>) -> Self {
        Self { navigator }
    }

    pub fn target(kind: PushKind) -> Screen {
        match kind {
            PushKind::NewRequest | PushKind::RequestUpdate => Screen::Requests,
            PushKind::RideUpdate => Screen::ShowRides,
        }
    }

    pub fn route(&self, payload: &PushPayload) -> RouteOutcome {
        let Some(kind) = PushKind::from_type(&payload.kind) else {
            tracing::warn!("Unknown notification type: {}", payload.kind);
            return RouteOutcome::Ignored;
        };

        let screen = Self::target(kind);
        if self.navigator.navigate(screen) {
            tracing::info!("Notification {} opened {}", payload.kind, screen);
            RouteOutcome::Navigated(screen)
        } else {
            RouteOutcome::NotNavigable(screen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(kind: &str) -> PushPayload {
        PushPayload {
            id: None,
            kind: kind.to_string(),
            request_id: None,
            ride_id: None,
            title: None,
            body: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_routes_known_types() {
        let nav = Arc::new(Navigator::new());
        nav.mount(Screen::Menu);
        let router = NotificationRouter::new(nav.clone());

        assert_eq!(router.route(&push("new_request")), RouteOutcome::Navigated(Screen::Requests));
        assert_eq!(router.route(&push("ride_update")), RouteOutcome::Navigated(Screen::ShowRides));
        assert_eq!(router.route(&push("request_update")), RouteOutcome::Navigated(Screen::Requests));
        assert_eq!(nav.current(), Some(Screen::Requests));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let nav = Arc::new(Navigator::new());
        nav.mount(Screen::Menu);
        let router = NotificationRouter::new(nav.clone());

        assert_eq!(router.route(&push("promo")), RouteOutcome::Ignored);
        assert_eq!(router.route(&push("")), RouteOutcome::Ignored);
        assert_eq!(nav.current(), Some(Screen::Menu));
    }

    #[test]
    fn test_not_navigable_is_noop() {
        let nav = Arc::new(Navigator::new());
        let router = NotificationRouter::new(nav.clone());

        assert_eq!(
            router.route(&push("new_request")),
            RouteOutcome::NotNavigable(Screen::Requests)
        );
        assert_eq!(nav.current(), None);

        // Nothing was queued for later
        nav.mount(Screen::Menu);
        assert_eq!(nav.current(), Some(Screen::Menu));
    }
}
