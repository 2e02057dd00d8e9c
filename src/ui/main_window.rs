use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use chrono::Local;
use gtk4 as gtk;

use crate::api::models::Message;
use crate::error::ApiError;
use crate::routes::Route;
use crate::sync::{self, Outgoing};
use crate::ui::Ctx;
use crate::ui::chat_view::ChatView;
use crate::ui::details::DetailsPane;
use crate::ui::navigation::NavigationRail;
use crate::ui::sidebar::Sidebar;
use crate::view::nav::nav_items;
use crate::view::thread::{ThreadHeader, thread_view};

enum FeedUpdate {
    Inserted(Message),
    Ended(Result<(), ApiError>),
}

/// The three chat panes plus the toast overlay they report through.
struct ChatScreen {
    ctx: Ctx,
    overlay: adw::ToastOverlay,
    sidebar: Rc<Sidebar>,
    chat_view: Rc<ChatView>,
    details: DetailsPane,
}

impl ChatScreen {
    fn toast(&self, text: &str) {
        self.overlay.add_toast(adw::Toast::new(text));
    }

    fn render_sidebar(&self) {
        let engine = self.ctx.engine.borrow();
        self.sidebar.render(engine.store().chats(), engine.active());
    }

    fn render_thread(&self) {
        let me = self.ctx.user_id();
        let engine = self.ctx.engine.borrow();
        let chat = engine.active().and_then(|id| engine.store().chat(id));
        let header = chat.map(ThreadHeader::new);
        let view = thread_view(chat, engine.is_loading(), &engine.thread(), me.as_deref(), &Local);
        self.chat_view.render(header.as_ref(), &view);
    }

    fn render_details(&self) {
        let engine = self.ctx.engine.borrow();
        self.details.render(engine.active().and_then(|id| engine.store().chat(id)));
    }

    fn select(self: &Rc<Self>, chat_id: &str) {
        let selection = self.ctx.engine.borrow_mut().select(Some(chat_id));
        self.render_thread();
        self.render_details();
        let Some(selection) = selection else { return };

        let session = self.ctx.gateway.borrow().session();
        let api = self.ctx.gateway.borrow().api();
        let (Some(session), Ok(api)) = (session, api) else { return };
        let chat_id = selection.chat_id.clone();
        let rx = crate::utils::run_async_to_main(async move {
            sync::fetch_thread(&api, &session, &chat_id).await
        });
        let screen = self.clone();
        rx.attach(None, move |res| {
            let repaint = match res {
                Ok(messages) => screen.ctx.engine.borrow_mut().apply_fetched(&selection, messages),
                Err(e) => {
                    screen.ctx.engine.borrow_mut().fetch_failed(&selection, &e);
                    screen.ctx.engine.borrow().is_current(&selection)
                }
            };
            if repaint {
                screen.render_thread();
            }
            glib::ControlFlow::Continue
        });
    }

    fn send(self: &Rc<Self>, text: String) {
        let Some(chat_id) = self.ctx.engine.borrow().active().map(str::to_string) else {
            return;
        };
        let Some(session) = self.ctx.gateway.borrow().session() else {
            self.toast(&format!("Message not sent: {}", ApiError::NotSignedIn));
            return;
        };
        let Some(outgoing) = Outgoing::new(&chat_id, &session.user.id, &text) else {
            return;
        };
        let api = match self.ctx.gateway.borrow().api() {
            Ok(api) => api,
            Err(e) => {
                self.toast(&format!("Message not sent: {}", e));
                return;
            }
        };

        self.chat_view.set_sending(true);
        let rx = crate::utils::run_async_to_main(async move {
            sync::deliver(&api, &session, &outgoing).await
        });
        let screen = self.clone();
        rx.attach(None, move |res| {
            screen.chat_view.set_sending(false);
            match res {
                Ok(()) => screen.chat_view.clear_input(),
                Err(e) => {
                    log::error!("sending to {} failed: {}", chat_id, e);
                    screen.toast(&format!("Message not sent: {}", e));
                }
            }
            glib::ControlFlow::Continue
        });
    }

    fn on_live(&self, message: Message) {
        let active = self.ctx.engine.borrow_mut().apply_live(message);
        self.render_sidebar();
        if active {
            self.render_thread();
        }
    }

    /// Profile and conversation list for the signed-in user.
    fn load_initial(self: &Rc<Self>) {
        if self.ctx.engine.borrow_mut().restore_chats() {
            self.render_sidebar();
        }
        let session = self.ctx.gateway.borrow().session();
        let api = self.ctx.gateway.borrow().api();
        let (Some(session), Ok(api)) = (session, api) else { return };
        let user_id = session.user.id.clone();
        let rx = crate::utils::run_async_to_main(async move {
            let token = session.access_token.as_str();
            let profile = api.profile(token, &session.user.id).await?;
            let chats = api.conversations(token, &session.user.id).await?;
            Ok::<_, ApiError>((profile, chats))
        });
        let screen = self.clone();
        rx.attach(None, move |res| {
            if screen.ctx.engine.borrow().user() != Some(user_id.as_str()) {
                log::debug!("dropping conversation list loaded for {}", user_id);
                return glib::ControlFlow::Continue;
            }
            match res {
                Ok((profile, chats)) => {
                    {
                        let mut engine = screen.ctx.engine.borrow_mut();
                        if let Some(profile) = profile {
                            engine.store_mut().set_profile(profile);
                        }
                        engine.apply_chats(chats);
                    }
                    screen.render_sidebar();
                    let first = {
                        let engine = screen.ctx.engine.borrow();
                        match engine.active() {
                            Some(_) => None,
                            None => engine.store().chats().first().map(|c| c.id.clone()),
                        }
                    };
                    match first {
                        Some(id) => {
                            screen.select(&id);
                            screen.render_sidebar();
                        }
                        None => {
                            screen.render_thread();
                            screen.render_details();
                        }
                    }
                }
                Err(e) => {
                    log::error!("loading conversations failed: {}", e);
                    screen.toast(&format!("Failed to load chats: {}", e));
                }
            }
            glib::ControlFlow::Continue
        });
    }

    /// Subscribes to inserted messages. Returns the task so the window can stop it.
    fn start_feed(self: &Rc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let sessions = self.ctx.gateway.borrow().subscribe();
        if sessions.borrow().is_none() {
            return None;
        }
        let url = match self.ctx.gateway.borrow().api().and_then(|api| api.realtime_url()) {
            Ok(url) => url,
            Err(e) => {
                log::warn!("realtime unavailable: {}", e);
                return None;
            }
        };
        let (tx, rx) = crate::utils::glib_channel::<FeedUpdate>();
        let handle = crate::utils::RUNTIME.spawn(async move {
            let insert_tx = tx.clone();
            let res = crate::api::events::run_insert_feed(url, sessions, move |msg| {
                let _ = insert_tx.send(FeedUpdate::Inserted(msg));
            })
            .await;
            let _ = tx.send(FeedUpdate::Ended(res));
        });
        let screen = self.clone();
        rx.attach(None, move |update| {
            match update {
                FeedUpdate::Inserted(msg) => screen.on_live(msg),
                FeedUpdate::Ended(Ok(())) => log::info!("message feed stopped"),
                FeedUpdate::Ended(Err(e)) => {
                    log::error!("message feed failed: {}", e);
                    screen.toast("Live updates unavailable");
                }
            }
            glib::ControlFlow::Continue
        });
        Some(handle)
    }
}

fn placeholder_page(title: &str) -> adw::StatusPage {
    let page = adw::StatusPage::new();
    page.set_title(title);
    page.set_description(Some("Nothing here yet"));
    page
}

pub fn show_main_window(app: &Application, ctx: &Ctx) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Periskon")
        .default_width(1280)
        .default_height(800)
        .build();

    // A previous window may have left a selection behind
    {
        let mut engine = ctx.engine.borrow_mut();
        engine.set_user(ctx.user_id().as_deref());
        engine.select(None);
    }

    let overlay = adw::ToastOverlay::new();
    let screen = Rc::new(ChatScreen {
        ctx: ctx.clone(),
        overlay: overlay.clone(),
        sidebar: Sidebar::new(),
        chat_view: ChatView::new(),
        details: DetailsPane::new(),
    });

    let chats_page = gtk::Box::new(gtk::Orientation::Horizontal, 0);
    chats_page.append(&screen.sidebar.widget());
    chats_page.append(&gtk::Separator::new(gtk::Orientation::Vertical));
    chats_page.append(&screen.chat_view.widget());
    chats_page.append(&gtk::Separator::new(gtk::Orientation::Vertical));
    chats_page.append(&screen.details.widget());

    let pages = gtk::Stack::new();
    pages.set_hexpand(true);
    pages.add_named(&chats_page, Some(Route::Chats.path()));
    for item in nav_items().into_iter().chain([crate::view::nav::settings_item()]) {
        if item.route != Route::Chats {
            pages.add_named(&placeholder_page(item.label), Some(item.route.path()));
        }
    }

    let rail: Rc<std::cell::OnceCell<NavigationRail>> = Rc::new(std::cell::OnceCell::new());
    let on_navigate: Rc<dyn Fn(Route)> = {
        let ctx = ctx.clone();
        let pages = pages.clone();
        let rail = rail.clone();
        Rc::new(move |route: Route| {
            let landed = ctx.router.borrow_mut().navigate(route.path()).clone();
            if pages.child_by_name(landed.path()).is_some() {
                pages.set_visible_child_name(landed.path());
            }
            if let Some(rail) = rail.get() {
                rail.set_active(&landed);
            }
        })
    };
    let nav = NavigationRail::new(on_navigate);
    let body = gtk::Box::new(gtk::Orientation::Horizontal, 0);
    body.append(&nav.widget());
    body.append(&gtk::Separator::new(gtk::Orientation::Vertical));
    body.append(&pages);
    let current = ctx.router.borrow().current().clone();
    nav.set_active(&current);
    if pages.child_by_name(current.path()).is_some() {
        pages.set_visible_child_name(current.path());
    }
    let _ = rail.set(nav);

    overlay.set_child(Some(&body));

    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let title = gtk::Label::new(Some("Periskon"));
    header.set_title_widget(Some(&title));
    let sign_out_btn = gtk::Button::from_icon_name("system-log-out-symbolic");
    sign_out_btn.set_tooltip_text(Some("Sign out"));
    header.pack_end(&sign_out_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));

    {
        let screen_sel = screen.clone();
        screen.sidebar.connect_selected(move |id| screen_sel.select(&id));
        let screen_filter = screen.clone();
        screen.sidebar.connect_filter_changed(move || screen_filter.render_sidebar());
        let screen_send = screen.clone();
        screen.chat_view.connect_send(move |text| screen_send.send(text));
    }
    {
        let ctx = ctx.clone();
        sign_out_btn.connect_clicked(move |_| {
            let session = ctx.gateway.borrow().session();
            if let (Some(session), Ok(api)) = (session, ctx.gateway.borrow().api()) {
                crate::utils::spawn_async(async move { crate::session::sign_out(&api, &session).await });
            }
            if let Err(e) = ctx.gateway.borrow_mut().clear() {
                log::warn!("could not forget session: {}", e);
            }
        });
    }

    screen.render_sidebar();
    screen.render_thread();
    screen.render_details();
    window.present();

    screen.load_initial();
    if let Some(feed) = screen.start_feed() {
        window.connect_destroy(move |_| feed.abort());
    }
}
