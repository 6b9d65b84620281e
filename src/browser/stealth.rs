//! Navigator patches installed before any page script runs.
//!
//! Identity providers refuse sign-in from browsers that advertise
//! automation, so new documents get these applied via
//! `Page.addScriptToEvaluateOnNewDocument`.

pub const NEW_DOCUMENT_PATCHES: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, app: {} };
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
];

/// Chrome flags that keep automation banners and first-run UI out of the
/// session (and out of the recording).
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
];
