pub struct ThemeDefinition {
    pub css: &'static str,
    pub title_class: &'static str,
}

/// The app ships a single slate palette.
pub fn theme_definition() -> ThemeDefinition {
    ThemeDefinition {
        css: SLATE_THEME,
        title_class: "header-title",
    }
}

const SLATE_THEME: &str = r#"
:root {
    --color-bg-primary: #0f172a;
    --color-bg-secondary: #1e293b;
    --color-surface-muted: #334155;
    --color-text-primary: #f1f5f9;
    --color-text-muted: #94a3b8;
    --color-border: #334155;
    --color-accent: #0284c7;
    --color-accent-hover: #0369a1;
    --color-accent-soft: #7dd3fc;
    --color-chat-user-bg: #0284c7;
    --color-chat-user-text: #ffffff;
    --color-chat-assistant-bg: #334155;
    --color-chat-assistant-text: #f1f5f9;
    --color-error-bg: #991b1b;
    --color-error-border: #ef4444;
    --color-error-text: #fee2e2;
    --color-notice-bg: #b91c1c;
}
* { box-sizing: border-box; }
body {
    margin: 0;
    background: var(--color-bg-primary);
    color: var(--color-text-primary);
    font-family: system-ui, -apple-system, "Segoe UI", sans-serif;
}
.app { display: flex; flex-direction: column; height: 100vh; }
.loading-screen {
    display: flex; flex-direction: column; align-items: center; justify-content: center;
    height: 100vh; gap: 1rem; font-size: 1.125rem;
}
.header {
    position: sticky; top: 0; z-index: 20; padding: 1rem; text-align: center;
    background: var(--color-bg-secondary); box-shadow: 0 4px 12px rgba(0, 0, 0, 0.35);
}
.header-title {
    margin: 0; font-size: 1.5rem; font-weight: 700; letter-spacing: -0.01em;
    background: linear-gradient(to right, #38bdf8, #67e8f9);
    -webkit-background-clip: text; background-clip: text; color: transparent;
}
.config-banner {
    display: flex; align-items: center; gap: 0.75rem; padding: 1rem;
    background: var(--color-error-bg); border-left: 4px solid var(--color-error-border);
    color: var(--color-error-text);
}
.config-banner-title { margin: 0; font-weight: 700; }
.config-banner-text { margin: 0; font-size: 0.875rem; }
.error-notice {
    padding: 0.75rem; text-align: center; font-size: 0.875rem;
    background: var(--color-notice-bg); color: var(--color-error-text);
}
.chat-list { flex: 1; overflow-y: auto; padding: 1rem; display: flex; flex-direction: column; gap: 1rem; }
.message-row { display: flex; width: 100%; }
.message-row.user { justify-content: flex-end; }
.message-row.assistant { justify-content: flex-start; }
.bubble {
    max-width: 42rem; padding: 0.75rem; border-radius: 0.75rem;
    white-space: pre-wrap; word-break: break-word; box-shadow: 0 2px 6px rgba(0, 0, 0, 0.3);
}
.bubble.user { background: var(--color-chat-user-bg); color: var(--color-chat-user-text); border-bottom-right-radius: 0; }
.bubble.assistant { background: var(--color-chat-assistant-bg); color: var(--color-chat-assistant-text); border-bottom-left-radius: 0; }
.message-timestamp { display: block; margin-top: 0.25rem; font-size: 0.7rem; color: var(--color-text-muted); }
.typing { display: flex; align-items: center; gap: 0.5rem; margin-top: 0.5rem; font-size: 0.75rem; color: var(--color-text-muted); }
.spinner {
    width: 1rem; height: 1rem; border-radius: 50%;
    border: 2px solid var(--color-accent-soft); border-top-color: transparent;
    animation: spin 0.8s linear infinite;
}
.spinner.lg { width: 3rem; height: 3rem; border-width: 4px; }
@keyframes spin { to { transform: rotate(360deg); } }
.composer {
    position: sticky; bottom: 0; z-index: 20; display: flex; align-items: flex-start; gap: 0.75rem;
    padding: 0.75rem; background: var(--color-bg-secondary); border-top: 1px solid var(--color-border);
}
.composer textarea {
    flex: 1; padding: 0.75rem; resize: none; border: none; border-radius: 0.5rem;
    background: var(--color-surface-muted); color: var(--color-text-primary); font: inherit;
}
.composer textarea:focus { outline: 2px solid var(--color-accent); }
.btn-send {
    width: 48px; height: 48px; border: none; border-radius: 0.5rem; cursor: pointer;
    display: flex; align-items: center; justify-content: center;
    background: var(--color-accent); color: #ffffff;
}
.btn-send:hover { background: var(--color-accent-hover); }
.btn-send:disabled { opacity: 0.5; cursor: not-allowed; }
"#;
