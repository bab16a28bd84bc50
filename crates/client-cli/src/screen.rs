//! Screens, navigation, and focus-driven data loading.
//!
//! `Navigator` publishes the focused screen on a watch channel. A
//! `FocusLoader` observes it and re-runs its load every time its screen gains
//! focus. A newer focus aborts the load still in flight, and dropping the
//! loader aborts both the observer and any in-flight load.

use std::fmt;
use std::future::Future;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Home,
    Login,
    Register,
    Code,
    Details,
    Selection,
    Menu,
    PostRide,
    CheckRides,
    ShowRides,
    EditRide,
    Requests,
    Profile,
    Questions,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Home => "Home",
            Screen::Login => "Login",
            Screen::Register => "Register",
            Screen::Code => "Code",
            Screen::Details => "Details",
            Screen::Selection => "Selection",
            Screen::Menu => "Menu",
            Screen::PostRide => "PostRide",
            Screen::CheckRides => "CheckRides",
            Screen::ShowRides => "ShowRides",
            Screen::EditRide => "EditRide",
            Screen::Requests => "Requests",
            Screen::Profile => "Profile",
            Screen::Questions => "Questions",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks the focused screen. Navigation is a no-op until a screen is mounted.
pub struct Navigator {
    focused: watch::Sender<Option<Screen>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        let (focused, _) = watch::channel(None);
        Self { focused }
    }

    /// Become navigable with an initial screen focused
    pub fn mount(&self, initial: Screen) {
        tracing::debug!("Navigator mounted at {}", initial);
        self.focused.send_replace(Some(initial));
    }

    pub fn unmount(&self) {
        self.focused.send_replace(None);
    }

    pub fn is_navigable(&self) -> bool {
        self.focused.borrow().is_some()
    }

    pub fn current(&self) -> Option<Screen> {
        *self.focused.borrow()
    }

    /// Focus `screen`. Re-focusing the current screen still fires a focus
    /// event. Returns false when nothing is mounted.
    pub fn navigate(&self, screen: Screen) -> bool {
        if !self.is_navigable() {
            tracing::debug!("Navigation to {} dropped: navigator not mounted", screen);
            return false;
        }
        self.focused.send_replace(Some(screen));
        true
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Screen>> {
        self.focused.subscribe()
    }
}

struct AbortOnDrop(Option<JoinHandle<()>>);

impl AbortOnDrop {
    fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.0.replace(handle) {
            if !previous.is_finished() {
                tracing::debug!("Aborting stale load");
                previous.abort();
            }
        }
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Focus-driven loader for one screen
pub struct FocusLoader {
    observer: JoinHandle<()>,
}

impl FocusLoader {
    /// Start observing `navigator`. Results are delivered on the returned
    /// channel; a load aborted by a newer focus delivers nothing.
    pub fn spawn<F, Fut, T>(navigator: &Navigator, screen: Screen, load: F) -> (Self, mpsc::Receiver<T>)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(8);
        let mut focus = navigator.subscribe();

        let observer = tokio::spawn(async move {
            let mut inflight = AbortOnDrop(None);
            loop {
                let focused = *focus.borrow_and_update() == Some(screen);
                if focused {
                    tracing::debug!("{} focused, loading", screen);
                    let fut = load();
                    let tx = tx.clone();
                    inflight.replace(tokio::spawn(async move {
                        let value = fut.await;
                        let _ = tx.send(value).await;
                    }));
                }
                if focus.changed().await.is_err() {
                    break;
                }
            }
        });

        (Self { observer }, rx)
    }
}

impl Drop for FocusLoader {
    fn drop(&mut self) {
        self.observer.abort();
    }
}
