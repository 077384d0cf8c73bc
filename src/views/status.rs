use dioxus::prelude::*;

#[component]
pub fn Spinner(large: bool) -> Element {
    let size = if large { "spinner lg" } else { "spinner" };
    rsx! {
        div { class: "{size}", role: "status" }
    }
}

/// Shown in place of the error notice when start-up failed.
#[component]
pub fn ConfigBanner(message: String) -> Element {
    rsx! {
        div { class: "config-banner", role: "alert",
            span { "⚠" }
            div {
                p { class: "config-banner-title", "Configuration Error" }
                p { class: "config-banner-text", "{message}" }
            }
        }
    }
}
