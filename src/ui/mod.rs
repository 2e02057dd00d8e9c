pub mod chat_view;
pub mod details;
pub mod login;
pub mod main_window;
pub mod navigation;
pub mod sidebar;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;

use crate::config::Config;
use crate::routes::{AuthState, Route, Router};
use crate::session::SessionGateway;
use crate::storage::RecordCache;
use crate::sync::SyncEngine;

const REFRESH_CHECK_SECS: u32 = 60;

const CSS: &str = r#"
.app-logo { background: #8b5cf6; color: white; border-radius: 999px; min-width: 40px; min-height: 40px; font-weight: bold; }
.nav-active { background: alpha(@accent_bg_color, 0.2); }
.avatar-initials { background: alpha(@accent_bg_color, 0.25); border-radius: 999px; min-width: 40px; min-height: 40px; font-weight: bold; }
.chat-row-preview { opacity: 0.7; }
.badge { border-radius: 6px; padding: 0 6px; font-size: smaller; border: 1px solid; }
.badge-orange { background: #ffedd5; color: #9a3412; border-color: #fed7aa; }
.badge-green { background: #dcfce7; color: #166534; border-color: #bbf7d0; }
.badge-blue { background: #dbeafe; color: #1e40af; border-color: #bfdbfe; }
.badge-red { background: #fee2e2; color: #991b1b; border-color: #fecaca; }
.badge-purple { background: #f3e8ff; color: #6b21a8; border-color: #e9d5ff; }
.badge-gray { background: #f3f4f6; color: #1f2937; border-color: #e5e7eb; }
.bubble { border-radius: 10px; padding: 8px 14px; }
.bubble-own { background: #dcfce7; color: #14532d; border-bottom-right-radius: 0; }
.bubble-other { background: white; color: black; border-bottom-left-radius: 0; }
.bubble-sender { color: #2563eb; font-size: smaller; font-weight: bold; }
.field-error { color: @error_color; font-size: smaller; }
.filter-active { color: @accent_color; }
"#;

/// State shared by every window. Lives on the GTK main thread.
pub struct AppContext {
    pub gateway: RefCell<SessionGateway>,
    pub engine: RefCell<SyncEngine>,
    pub router: RefCell<Router>,
    refreshing: Cell<bool>,
}

pub type Ctx = Rc<AppContext>;

impl AppContext {
    pub fn user_id(&self) -> Option<String> {
        self.gateway.borrow().session().map(|s| s.user.id)
    }
}

fn load_css() {
    let provider = gtk::CssProvider::new();
    provider.load_from_data(CSS);
    if let Some(display) = gtk::gdk::Display::default() {
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }
}

pub fn build_ui(app: &Application) {
    load_css();
    let gateway = SessionGateway::new(Config::load());
    let cache = match RecordCache::open_default().or_else(|e| {
        log::warn!("persistent cache unavailable, using memory: {}", e);
        RecordCache::open_in_memory()
    }) {
        Ok(cache) => cache,
        Err(e) => {
            log::error!("no usable record cache: {}", e);
            return;
        }
    };

    // Optimistic pass on the persisted session; `watch_session` re-runs the same guard.
    let router = Router::new(gateway.auth_state());
    let mut engine = SyncEngine::new(cache);
    engine.set_user(gateway.session().map(|s| s.user.id).as_deref());
    let ctx: Ctx = Rc::new(AppContext {
        gateway: RefCell::new(gateway),
        engine: RefCell::new(engine),
        router: RefCell::new(router),
        refreshing: Cell::new(false),
    });

    let start = ctx.router.borrow().current().clone();
    open_route(app, &ctx, &start);
    watch_session(app, &ctx);
    refresh_session(&ctx);
    {
        let ctx = ctx.clone();
        glib::timeout_add_seconds_local(REFRESH_CHECK_SECS, move || {
            let now = chrono::Utc::now().timestamp();
            if ctx.gateway.borrow().needs_refresh(now) {
                refresh_session(&ctx);
            }
            glib::ControlFlow::Continue
        });
    }
}

/// Replaces whatever windows are open with the one for `route`.
pub fn open_route(app: &Application, ctx: &Ctx, route: &Route) {
    let previous = app.windows();
    if route.is_public() {
        login::show_login_window(app, ctx);
    } else {
        main_window::show_main_window(app, ctx);
    }
    for window in previous {
        window.close();
    }
}

fn watch_session(app: &Application, ctx: &Ctx) {
    let mut rx = ctx.gateway.borrow().subscribe();
    let app = app.clone();
    let ctx = ctx.clone();
    glib::MainContext::default().spawn_local(async move {
        while rx.changed().await.is_ok() {
            let (auth, user) = {
                let session = rx.borrow_and_update();
                (AuthState::from_session(session.as_ref()), session.as_ref().map(|s| s.user.id.clone()))
            };
            ctx.engine.borrow_mut().set_user(user.as_deref());
            let moved = ctx.router.borrow_mut().set_auth(auth).cloned();
            if let Some(route) = moved {
                log::info!("session change moves view to {}", route);
                open_route(&app, &ctx, &route);
            }
        }
    });
}

/// Validates the stored session against the backend, refreshing it when close to expiry.
fn refresh_session(ctx: &Ctx) {
    let Some(session) = ctx.gateway.borrow().session() else {
        return;
    };
    if ctx.refreshing.replace(true) {
        return;
    }
    let api = ctx.gateway.borrow().api();
    let now = chrono::Utc::now().timestamp();
    let rx = crate::utils::run_async_to_main(async move {
        crate::session::restore(&api?, session, now).await
    });
    let ctx = ctx.clone();
    rx.attach(None, move |res| {
        ctx.refreshing.set(false);
        let current = ctx.gateway.borrow().session();
        let outcome = match res {
            Ok(Some(fresh)) if Some(&fresh) != current.as_ref() => ctx.gateway.borrow_mut().establish(fresh),
            Ok(Some(_)) => Ok(()),
            Ok(None) => ctx.gateway.borrow_mut().clear(),
            Err(e) => {
                log::warn!("could not validate session, keeping it: {}", e);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            log::warn!("could not persist session change: {}", e);
        }
        glib::ControlFlow::Continue
    });
}
