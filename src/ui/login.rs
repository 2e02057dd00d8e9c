use std::rc::Rc;

use adw::Application;
use adw::prelude::*;
use gtk4 as gtk;

use crate::api::models::SignUpOutcome;
use crate::error::ValidationErrors;
use crate::session::{self, LoginForm, SignupForm};
use crate::ui::Ctx;

struct Field {
    entry: gtk::Widget,
    error: gtk::Label,
}

impl Field {
    fn new(container: &gtk::Box, entry: &impl IsA<gtk::Widget>) -> Self {
        let error = gtk::Label::new(None);
        error.add_css_class("field-error");
        error.set_halign(gtk::Align::Start);
        error.set_visible(false);
        container.append(entry);
        container.append(&error);
        Self { entry: entry.clone().upcast(), error }
    }

    fn text(&self) -> String {
        self.entry
            .dynamic_cast_ref::<gtk::Editable>()
            .map(|e| e.text().to_string())
            .unwrap_or_default()
    }

    fn on_activate(&self, f: Rc<dyn Fn()>) {
        if let Some(e) = self.entry.downcast_ref::<gtk::Entry>() {
            e.connect_activate(move |_| f());
        } else if let Some(e) = self.entry.downcast_ref::<gtk::PasswordEntry>() {
            e.connect_activate(move |_| f());
        }
    }

    fn show(&self, errors: Option<&ValidationErrors>, name: &str) {
        match errors.and_then(|e| e.for_field(name)) {
            Some(msg) => {
                self.error.set_label(msg);
                self.error.set_visible(true);
            }
            None => self.error.set_visible(false),
        }
    }
}

fn entry(placeholder: &str) -> gtk::Entry {
    let e = gtk::Entry::new();
    e.set_placeholder_text(Some(placeholder));
    e.set_hexpand(true);
    e
}

fn password(placeholder: &str) -> gtk::PasswordEntry {
    let e = gtk::PasswordEntry::new();
    e.set_placeholder_text(Some(placeholder));
    e.set_show_peek_icon(true);
    e.set_hexpand(true);
    e
}

fn page() -> gtk::Box {
    let b = gtk::Box::new(gtk::Orientation::Vertical, 6);
    b.set_margin_top(12);
    b
}

/// Saves backend settings typed on this screen. Returns false if that failed.
fn apply_backend(ctx: &Ctx, url: &Option<(gtk::Entry, gtk::PasswordEntry)>, overlay: &adw::ToastOverlay) -> bool {
    let Some((url_entry, key_entry)) = url else {
        return true;
    };
    let backend = crate::utils::normalize_url(&url_entry.text());
    let key = key_entry.text().to_string();
    if backend.is_empty() || key.trim().is_empty() {
        overlay.add_toast(adw::Toast::new("Please enter the backend URL and anon key."));
        return false;
    }
    if let Err(e) = ctx.gateway.borrow_mut().set_backend(&backend, key.trim()) {
        overlay.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
        return false;
    }
    true
}

pub fn show_login_window(app: &Application, ctx: &Ctx) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Periskon Login")
        .default_width(440)
        .default_height(520)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Welcome to Periskon"));
    title.add_css_class("title-2");
    root.append(&title);
    let subtitle = gtk::Label::new(Some("Connect with friends and family instantly"));
    subtitle.add_css_class("dim-label");
    root.append(&subtitle);

    // Backend settings are only asked for until they are stored
    let backend_fields = if ctx.gateway.borrow().config().is_configured() {
        None
    } else {
        let url_entry = entry("Backend URL (e.g. https://project.example.co)");
        let key_entry = password("Anon key");
        let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
        form.append(&url_entry);
        form.append(&key_entry);
        root.append(&form);
        Some((url_entry, key_entry))
    };
    let backend_fields = Rc::new(backend_fields);

    let stack = gtk::Stack::new();
    let switcher = gtk::StackSwitcher::new();
    switcher.set_stack(Some(&stack));
    switcher.set_halign(gtk::Align::Center);
    root.append(&switcher);
    root.append(&stack);

    // Login tab
    let login_page = page();
    let login_email = Rc::new(Field::new(&login_page, &entry("Email")));
    let login_pass = Rc::new(Field::new(&login_page, &password("Password")));
    let login_btn = gtk::Button::with_label("Login");
    login_btn.add_css_class("suggested-action");
    login_page.append(&login_btn);
    stack.add_titled(&login_page, Some("login"), "Login");

    // Sign up tab
    let signup_page = page();
    let signup_name = Rc::new(Field::new(&signup_page, &entry("Full name")));
    let signup_email = Rc::new(Field::new(&signup_page, &entry("Email")));
    let signup_pass = Rc::new(Field::new(&signup_page, &password("Password")));
    let signup_phone = Rc::new(Field::new(&signup_page, &entry("Phone number")));
    let signup_btn = gtk::Button::with_label("Sign Up");
    signup_btn.add_css_class("suggested-action");
    signup_page.append(&signup_btn);
    stack.add_titled(&signup_page, Some("signup"), "Sign Up");

    if matches!(*ctx.router.borrow().current(), crate::routes::Route::Signup) {
        stack.set_visible_child_name("signup");
    }

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("Periskon"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_login: Rc<dyn Fn()> = {
        let ctx = ctx.clone();
        let overlay = toast_overlay.clone();
        let backend_fields = backend_fields.clone();
        let (email, pass) = (login_email.clone(), login_pass.clone());
        let button = login_btn.clone();
        Rc::new(move || {
            let form = LoginForm { email: email.text(), password: pass.text() };
            let errors = form.validate().err();
            email.show(errors.as_ref(), "email");
            pass.show(errors.as_ref(), "password");
            if errors.is_some() || !apply_backend(&ctx, &backend_fields, &overlay) {
                return;
            }
            let api = match ctx.gateway.borrow().api() {
                Ok(api) => api,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&format!("Login failed: {}", e)));
                    return;
                }
            };

            button.set_sensitive(false);
            button.set_label("Logging in...");
            let rx = crate::utils::run_async_to_main(async move { session::sign_in(&api, &form).await });

            let ctx = ctx.clone();
            let overlay = overlay.clone();
            let button = button.clone();
            rx.attach(None, move |res| {
                button.set_sensitive(true);
                button.set_label("Login");
                match res {
                    Ok(session) => {
                        overlay.add_toast(adw::Toast::new("Login successful"));
                        if let Err(e) = ctx.gateway.borrow_mut().establish(session) {
                            log::warn!("session not persisted: {}", e);
                        }
                    }
                    Err(err) => {
                        log::error!("login failed: {}", err);
                        overlay.add_toast(adw::Toast::new(&format!("Login failed: {}", err.toast_description())));
                    }
                }
                glib::ControlFlow::Continue
            });
        })
    };

    let on_signup: Rc<dyn Fn()> = {
        let ctx = ctx.clone();
        let overlay = toast_overlay.clone();
        let backend_fields = backend_fields.clone();
        let stack = stack.clone();
        let (name, email, pass, phone) =
            (signup_name.clone(), signup_email.clone(), signup_pass.clone(), signup_phone.clone());
        let button = signup_btn.clone();
        Rc::new(move || {
            let form = SignupForm {
                name: name.text(),
                email: email.text(),
                password: pass.text(),
                phone: phone.text(),
            };
            let errors = form.validate().err();
            name.show(errors.as_ref(), "name");
            email.show(errors.as_ref(), "email");
            pass.show(errors.as_ref(), "password");
            phone.show(errors.as_ref(), "phone");
            if errors.is_some() || !apply_backend(&ctx, &backend_fields, &overlay) {
                return;
            }
            let api = match ctx.gateway.borrow().api() {
                Ok(api) => api,
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&format!("Signup failed: {}", e)));
                    return;
                }
            };

            button.set_sensitive(false);
            button.set_label("Creating account...");
            let rx = crate::utils::run_async_to_main(async move { session::sign_up(&api, &form).await });

            let ctx = ctx.clone();
            let overlay = overlay.clone();
            let button = button.clone();
            let stack = stack.clone();
            rx.attach(None, move |res| {
                button.set_sensitive(true);
                button.set_label("Sign Up");
                match res {
                    Ok(SignUpOutcome::SignedIn(session)) => {
                        overlay.add_toast(adw::Toast::new("Account created successfully"));
                        if let Err(e) = ctx.gateway.borrow_mut().establish(session) {
                            log::warn!("session not persisted: {}", e);
                        }
                    }
                    Ok(SignUpOutcome::ConfirmationRequired { .. }) => {
                        overlay.add_toast(adw::Toast::new(
                            "Account created successfully. You can now log in with your credentials.",
                        ));
                        stack.set_visible_child_name("login");
                    }
                    Err(err) => {
                        log::error!("signup failed: {}", err);
                        overlay.add_toast(adw::Toast::new(&format!("Signup failed: {}", err.toast_description())));
                    }
                }
                glib::ControlFlow::Continue
            });
        })
    };

    {
        let on_login = on_login.clone();
        login_btn.connect_clicked(move |_| (on_login)());
    }
    for field in [&login_email, &login_pass] {
        field.on_activate(on_login.clone());
    }
    {
        let on_signup = on_signup.clone();
        signup_btn.connect_clicked(move |_| (on_signup)());
    }

    window.present();
}
