use crate::config::{APP_TITLE, Config};
use crate::dispatcher::{DispatchState, Dispatcher};
use crate::session::connect_gemini;
use crate::theme::theme_definition;
use crate::views::{ChatView, ConfigBanner, Spinner};
use dioxus::prelude::*;
use tokio::sync::watch;

#[component]
pub fn App() -> Element {
    let dispatcher = use_hook(Dispatcher::new);
    let phase = use_watched({
        let dispatcher = dispatcher.clone();
        move || dispatcher.subscribe_phase()
    });
    let transcript = use_watched({
        let dispatcher = dispatcher.clone();
        move || dispatcher.subscribe_transcript()
    });
    let state = use_watched({
        let dispatcher = dispatcher.clone();
        move || dispatcher.subscribe_state()
    });
    let notice = use_watched({
        let dispatcher = dispatcher.clone();
        move || dispatcher.subscribe_notice()
    });

    use_session_start(dispatcher.clone());

    let current_phase = phase();
    if current_phase.is_initializing() {
        return rsx! {
            ThemeStyles {}
            div { class: "loading-screen",
                Spinner { large: true }
                p { "Initializing {APP_TITLE}..." }
            }
        };
    }

    let busy = state() != DispatchState::Idle;
    let on_send = move |text: String| {
        if let Some(rejection) = dispatcher.submit(&text).rejection() {
            tracing::debug!(?rejection, "send ignored");
        }
    };

    rsx! {
        ThemeStyles {}
        div { class: "app",
            AppHeader {}
            if let Some(reason) = current_phase.banner() {
                ConfigBanner { message: reason.to_string() }
            } else if let Some(message) = notice() {
                div { class: "error-notice", "{message}" }
            }
            ChatView {
                transcript,
                busy,
                disabled: !current_phase.is_ready(),
                on_send,
            }
        }
    }
}

/// Opens the conversation once, after the first render shows the loader.
fn use_session_start(dispatcher: Dispatcher) {
    use_future(move || {
        let dispatcher = dispatcher.clone();
        async move {
            let config = Config::from_env();
            dispatcher.initialize(&config, connect_gemini).await;
        }
    });
}

/// Mirrors a watch channel into a signal so every committed value re-renders.
fn use_watched<T: Clone + 'static>(subscribe: impl FnOnce() -> watch::Receiver<T>) -> Signal<T> {
    let rx = use_hook(subscribe);
    let mut value = use_signal(|| rx.borrow().clone());
    use_future(move || {
        let mut rx = rx.clone();
        async move {
            while rx.changed().await.is_ok() {
                value.set(rx.borrow_and_update().clone());
            }
        }
    });
    value
}

#[component]
fn ThemeStyles() -> Element {
    let definition = theme_definition();
    rsx! {
        style { dangerous_inner_html: "{definition.css}" }
    }
}

#[component]
fn AppHeader() -> Element {
    let theme = theme_definition();
    rsx! {
        header { class: "header",
            h1 { class: "{theme.title_class}", "{APP_TITLE}" }
        }
    }
}

