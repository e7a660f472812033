//! Startup capability check choosing the front end.

use std::net::TcpListener;

use palaver_core::{FrontendKind, FrontendPreference};
use tracing::{debug, warn};

/// Pick the front end for this run.
///
/// The widget needs its listening address; if that cannot be bound the
/// terminal is used instead, whatever was asked for.
pub fn select_frontend(preference: FrontendPreference, addr: &str) -> FrontendKind {
    match preference {
        FrontendPreference::Terminal => FrontendKind::Terminal,
        FrontendPreference::Auto | FrontendPreference::Widget => {
            if widget_available(addr) {
                FrontendKind::Widget
            } else {
                if preference == FrontendPreference::Widget {
                    warn!(addr = %addr, "Cannot listen for the widget, falling back to the terminal");
                }
                FrontendKind::Terminal
            }
        }
    }
}

/// Try binding `addr`; the trial listener is dropped straight away.
fn widget_available(addr: &str) -> bool {
    match TcpListener::bind(addr) {
        Ok(_) => true,
        Err(e) => {
            debug!(addr = %addr, error = %e, "Widget address not bindable");
            false
        }
    }
}
