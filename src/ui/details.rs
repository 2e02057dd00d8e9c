use gtk4 as gtk;
use gtk4::prelude::*;

use crate::api::models::Conversation;
use crate::view::details::{self, DetailsPanel, Placeholder};

pub struct DetailsPane {
    root: gtk::Box,
    content: gtk::Box,
}

fn section(title: &str) -> (gtk::Box, gtk::Box) {
    let outer = gtk::Box::new(gtk::Orientation::Vertical, 6);
    let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    let heading = gtk::Label::new(Some(title));
    heading.add_css_class("heading");
    heading.set_halign(gtk::Align::Start);
    heading.set_hexpand(true);
    top.append(&heading);
    outer.append(&top);
    (outer, top)
}

fn show_placeholder(anchor: &gtk::Button, which: Placeholder) {
    let parent = anchor.root().and_then(|r| r.downcast::<gtk::Window>().ok());
    let dialog = gtk::Dialog::builder().title(which.title()).modal(true).build();
    dialog.set_transient_for(parent.as_ref());
    let body = gtk::Label::new(Some(which.body()));
    body.set_wrap(true);
    body.set_margin_top(16);
    body.set_margin_bottom(16);
    body.set_margin_start(16);
    body.set_margin_end(16);
    dialog.content_area().append(&body);
    dialog.add_button("Close", gtk::ResponseType::Close);
    dialog.connect_response(|d, _| d.close());
    dialog.present();
}

fn add_button(which: Placeholder) -> gtk::Button {
    let btn = gtk::Button::from_icon_name("list-add-symbolic");
    btn.add_css_class("flat");
    btn.set_tooltip_text(Some(which.title()));
    btn.connect_clicked(move |b| show_placeholder(b, which));
    btn
}

impl DetailsPane {
    pub fn new() -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
        root.set_width_request(280);
        root.set_margin_top(12);
        root.set_margin_bottom(12);
        root.set_margin_start(12);
        root.set_margin_end(12);
        let content = gtk::Box::new(gtk::Orientation::Vertical, 16);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .build();
        scroller.set_child(Some(&content));
        root.append(&scroller);
        Self { root, content }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn render(&self, chat: Option<&Conversation>) {
        while let Some(child) = self.content.first_child() {
            self.content.remove(&child);
        }
        let Some(chat) = chat else {
            let prompt = gtk::Label::new(Some(details::SELECT_PROMPT));
            prompt.add_css_class("dim-label");
            prompt.set_vexpand(true);
            self.content.append(&prompt);
            return;
        };
        let panel = DetailsPanel::new(chat);

        let (members, top) = section(&format!("Members ({})", panel.members.len()));
        top.append(&add_button(Placeholder::AddMember));
        for m in &panel.members {
            let row = gtk::Box::new(gtk::Orientation::Horizontal, 8);
            let avatar = gtk::Label::new(Some(&m.initials));
            avatar.add_css_class("avatar-initials");
            let text = gtk::Box::new(gtk::Orientation::Vertical, 0);
            let name = gtk::Label::new(Some(&m.name));
            name.set_halign(gtk::Align::Start);
            text.append(&name);
            if !m.phone.is_empty() {
                let phone = gtk::Label::new(Some(&m.phone));
                phone.add_css_class("dim-label");
                phone.add_css_class("caption");
                phone.set_halign(gtk::Align::Start);
                text.append(&phone);
            }
            row.append(&avatar);
            row.append(&text);
            members.append(&row);
        }
        self.content.append(&members);

        let (labels, top) = section("Labels");
        top.append(&add_button(Placeholder::AddLabel));
        if panel.labels.is_empty() {
            let none = gtk::Label::new(Some(details::NO_LABELS));
            none.add_css_class("dim-label");
            none.set_halign(gtk::Align::Start);
            labels.append(&none);
        } else {
            let chips = gtk::FlowBox::new();
            chips.set_selection_mode(gtk::SelectionMode::None);
            for chip in &panel.labels {
                let lbl = gtk::Label::new(None);
                lbl.set_markup(&format!(
                    "<span foreground=\"{}\">●</span> {}",
                    glib::markup_escape_text(&chip.color),
                    glib::markup_escape_text(&chip.name)
                ));
                lbl.add_css_class("badge");
                chips.insert(&lbl, -1);
            }
            labels.append(&chips);
        }
        self.content.append(&labels);

        let (files, _) = section(details::SHARED_FILES_TITLE);
        let none = gtk::Label::new(Some(details::NO_FILES));
        none.add_css_class("dim-label");
        none.set_halign(gtk::Align::Start);
        files.append(&none);
        self.content.append(&files);
    }
}
