use std::rc::Rc;

use adw::prelude::*;
use gtk4 as gtk;

use crate::view::thread::{self, Bubble, ThreadHeader, ThreadView};

pub struct ChatView {
    root: gtk::Box,
    header: gtk::Box,
    header_avatar: gtk::Label,
    header_title: gtk::Label,
    header_subtitle: gtk::Label,
    stack: gtk::Stack,
    status: adw::StatusPage,
    scroller: gtk::ScrolledWindow,
    messages_box: gtk::Box,
    input_row: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
}

fn bubble_widget(bubble: &Bubble) -> gtk::Widget {
    let b = gtk::Box::new(gtk::Orientation::Vertical, 2);
    b.add_css_class("bubble");
    b.add_css_class(bubble.css_class());
    b.set_halign(match bubble.align {
        thread::Align::Start => gtk::Align::Start,
        thread::Align::End => gtk::Align::End,
    });

    if let Some(sender) = &bubble.sender_label {
        let lbl = gtk::Label::new(Some(sender));
        lbl.add_css_class("bubble-sender");
        lbl.set_halign(gtk::Align::Start);
        b.append(&lbl);
    }

    let content = gtk::Label::new(Some(&bubble.content));
    content.set_wrap(true);
    content.set_wrap_mode(gtk::pango::WrapMode::WordChar);
    content.set_max_width_chars(48);
    content.set_xalign(0.0);
    content.set_selectable(true);
    b.append(&content);

    let footer = gtk::Box::new(gtk::Orientation::Horizontal, 4);
    footer.set_halign(gtk::Align::End);
    let time = gtk::Label::new(Some(&bubble.time_label));
    time.add_css_class("dim-label");
    time.add_css_class("caption");
    footer.append(&time);
    if bubble.delivered_check {
        footer.append(&gtk::Image::from_icon_name("object-select-symbolic"));
    }
    b.append(&footer);
    b.upcast()
}

impl ChatView {
    pub fn new() -> Rc<Self> {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_hexpand(true);

        let header = gtk::Box::new(gtk::Orientation::Horizontal, 10);
        header.set_margin_top(8);
        header.set_margin_start(12);
        header.set_margin_end(12);
        let header_avatar = gtk::Label::new(None);
        header_avatar.add_css_class("avatar-initials");
        let titles = gtk::Box::new(gtk::Orientation::Vertical, 0);
        let header_title = gtk::Label::new(None);
        header_title.add_css_class("heading");
        header_title.set_halign(gtk::Align::Start);
        let header_subtitle = gtk::Label::new(None);
        header_subtitle.add_css_class("dim-label");
        header_subtitle.add_css_class("caption");
        header_subtitle.set_halign(gtk::Align::Start);
        header_subtitle.set_ellipsize(gtk::pango::EllipsizeMode::End);
        titles.append(&header_title);
        titles.append(&header_subtitle);
        header.append(&header_avatar);
        header.append(&titles);
        root.append(&header);

        let stack = gtk::Stack::new();
        stack.set_vexpand(true);
        let status = adw::StatusPage::new();
        status.set_icon_name(Some("mail-unread-symbolic"));
        stack.add_named(&status, Some("status"));

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .build();
        let messages_box = gtk::Box::new(gtk::Orientation::Vertical, 6);
        messages_box.set_margin_top(8);
        messages_box.set_margin_bottom(8);
        messages_box.set_margin_start(12);
        messages_box.set_margin_end(12);
        scroller.set_child(Some(&messages_box));
        stack.add_named(&scroller, Some("messages"));
        root.append(&stack);

        let input_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        input_row.set_margin_bottom(8);
        input_row.set_margin_start(12);
        input_row.set_margin_end(12);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message..."));
        let send_btn = gtk::Button::from_icon_name("mail-send-symbolic");
        send_btn.add_css_class("suggested-action");
        send_btn.set_tooltip_text(Some("Send"));
        input_row.append(&entry);
        input_row.append(&send_btn);
        root.append(&input_row);

        Rc::new(Self {
            root,
            header,
            header_avatar,
            header_title,
            header_subtitle,
            stack,
            status,
            scroller,
            messages_box,
            input_row,
            entry,
            send_btn,
        })
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    /// `f` gets the raw input text; the input is left alone until [`ChatView::clear_input`].
    pub fn connect_send<F: Fn(String) + 'static>(&self, f: F) {
        let f: Rc<dyn Fn(String)> = Rc::new(f);
        {
            let f = f.clone();
            let entry = self.entry.clone();
            self.send_btn.connect_clicked(move |_| f(entry.text().to_string()));
        }
        self.entry.connect_activate(move |e| f(e.text().to_string()));
    }

    pub fn set_sending(&self, sending: bool) {
        self.entry.set_sensitive(!sending);
        self.send_btn.set_sensitive(!sending);
    }

    pub fn clear_input(&self) {
        self.entry.set_text("");
    }

    fn show_status(&self, title: &str, description: &str) {
        self.status.set_title(title);
        self.status.set_description(if description.is_empty() { None } else { Some(description) });
        self.stack.set_visible_child_name("status");
    }

    pub fn render(&self, header: Option<&ThreadHeader>, view: &ThreadView) {
        match header {
            Some(h) => {
                self.header_avatar.set_label(&h.initials);
                self.header_title.set_label(&h.title);
                self.header_subtitle.set_label(&h.subtitle);
                self.header.set_visible(true);
            }
            None => self.header.set_visible(false),
        }
        self.input_row.set_visible(header.is_some());

        match view {
            ThreadView::NoSelection => self.show_status(thread::SELECT_PROMPT, thread::SELECT_HINT),
            ThreadView::Loading => self.show_status(thread::LOADING, ""),
            ThreadView::Empty => self.show_status(thread::EMPTY, ""),
            ThreadView::Messages(bubbles) => {
                while let Some(child) = self.messages_box.first_child() {
                    self.messages_box.remove(&child);
                }
                for bubble in bubbles {
                    self.messages_box.append(&bubble_widget(bubble));
                }
                self.stack.set_visible_child_name("messages");
                let adj = self.scroller.vadjustment();
                glib::idle_add_local_once(move || adj.set_value(adj.upper()));
            }
        }
    }
}
