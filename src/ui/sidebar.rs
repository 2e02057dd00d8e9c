use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::Local;
use gtk4 as gtk;
use gtk4::prelude::*;

use crate::api::models::Conversation;
use crate::view::sidebar::{ChatFilter, ChatRow, chat_rows, label_names};

type Callback<T> = Rc<RefCell<Option<Box<dyn Fn(T)>>>>;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    filter_button: gtk::MenuButton,
    label_box: gtk::Box,
    known_labels: RefCell<Vec<String>>,
    filter: Rc<RefCell<ChatFilter>>,
    row_ids: Rc<RefCell<Vec<String>>>,
    // Set while rows are rebuilt so programmatic selection is not reported.
    rendering: Rc<Cell<bool>>,
    on_select: Callback<String>,
    on_filter: Callback<()>,
}

fn emit<T>(cb: &Callback<T>, value: T) {
    if let Some(cb) = cb.borrow().as_ref() {
        cb(value);
    }
}

fn build_row(row: &ChatRow) -> gtk::ListBoxRow {
    let outer = gtk::Box::new(gtk::Orientation::Horizontal, 10);
    outer.set_margin_top(8);
    outer.set_margin_bottom(8);
    outer.set_margin_start(8);
    outer.set_margin_end(8);

    let avatar = gtk::Label::new(Some(&row.initials));
    avatar.add_css_class("avatar-initials");
    avatar.set_valign(gtk::Align::Start);
    outer.append(&avatar);

    let body = gtk::Box::new(gtk::Orientation::Vertical, 2);
    body.set_hexpand(true);

    let top = gtk::Box::new(gtk::Orientation::Horizontal, 6);
    let title = gtk::Label::new(Some(&row.title));
    title.add_css_class("heading");
    title.set_halign(gtk::Align::Start);
    title.set_hexpand(true);
    title.set_ellipsize(gtk::pango::EllipsizeMode::End);
    let time = gtk::Label::new(Some(&row.time_label));
    time.add_css_class("dim-label");
    time.add_css_class("caption");
    top.append(&title);
    top.append(&time);
    body.append(&top);

    let preview = gtk::Label::new(Some(&row.preview));
    preview.add_css_class("chat-row-preview");
    preview.set_halign(gtk::Align::Start);
    preview.set_ellipsize(gtk::pango::EllipsizeMode::End);
    body.append(&preview);

    if !row.badges.is_empty() {
        let badges = gtk::Box::new(gtk::Orientation::Horizontal, 4);
        for (name, color) in &row.badges {
            let badge = gtk::Label::new(Some(name));
            badge.add_css_class("badge");
            badge.add_css_class(color.css_class());
            badges.append(&badge);
        }
        body.append(&badges);
    }

    outer.append(&body);
    let list_row = gtk::ListBoxRow::new();
    list_row.set_child(Some(&outer));
    list_row
}

impl Sidebar {
    pub fn new() -> Rc<Self> {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(320);

        let title = gtk::Label::new(Some("Chats"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let search_row = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let search = gtk::SearchEntry::new();
        search.set_placeholder_text(Some("Search chats"));
        search.set_hexpand(true);
        let filter_button = gtk::MenuButton::new();
        filter_button.set_icon_name("funnel-symbolic");
        filter_button.set_tooltip_text(Some("Filter by label"));
        let label_box = gtk::Box::new(gtk::Orientation::Vertical, 4);
        label_box.set_margin_top(6);
        label_box.set_margin_bottom(6);
        label_box.set_margin_start(6);
        label_box.set_margin_end(6);
        let popover = gtk::Popover::new();
        popover.set_child(Some(&label_box));
        filter_button.set_popover(Some(&popover));
        search_row.append(&search);
        search_row.append(&filter_button);
        root.append(&search_row);

        let list = gtk::ListBox::new();
        list.set_selection_mode(gtk::SelectionMode::Single);
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .build();
        scroller.set_child(Some(&list));
        root.append(&scroller);

        let sidebar = Rc::new(Self {
            root,
            list,
            filter_button,
            label_box,
            known_labels: RefCell::new(Vec::new()),
            filter: Rc::new(RefCell::new(ChatFilter::default())),
            row_ids: Rc::new(RefCell::new(Vec::new())),
            rendering: Rc::new(Cell::new(false)),
            on_select: Rc::new(RefCell::new(None)),
            on_filter: Rc::new(RefCell::new(None)),
        });

        {
            let row_ids = sidebar.row_ids.clone();
            let rendering = sidebar.rendering.clone();
            let on_select = sidebar.on_select.clone();
            sidebar.list.connect_row_selected(move |_, row| {
                if rendering.get() {
                    return;
                }
                let Some(row) = row else { return };
                let id = usize::try_from(row.index())
                    .ok()
                    .and_then(|i| row_ids.borrow().get(i).cloned());
                if let Some(id) = id {
                    emit(&on_select, id);
                }
            });
        }
        {
            let filter = sidebar.filter.clone();
            let on_filter = sidebar.on_filter.clone();
            search.connect_search_changed(move |entry| {
                filter.borrow_mut().set_query(&entry.text());
                emit(&on_filter, ());
            });
        }

        sidebar
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn connect_selected<F: Fn(String) + 'static>(&self, f: F) {
        *self.on_select.borrow_mut() = Some(Box::new(f));
    }

    pub fn connect_filter_changed<F: Fn() + 'static>(&self, f: F) {
        *self.on_filter.borrow_mut() = Some(Box::new(move |()| f()));
    }

    fn sync_label_toggles(&self, names: Vec<String>) {
        if *self.known_labels.borrow() == names {
            return;
        }
        while let Some(child) = self.label_box.first_child() {
            self.label_box.remove(&child);
        }
        let heading = gtk::Label::new(Some("Filter by label:"));
        heading.add_css_class("heading");
        heading.set_halign(gtk::Align::Start);
        self.label_box.append(&heading);
        if names.is_empty() {
            let none = gtk::Label::new(Some(crate::view::details::NO_LABELS));
            none.add_css_class("dim-label");
            self.label_box.append(&none);
        }
        for name in &names {
            let check = gtk::CheckButton::with_label(name);
            check.set_active(self.filter.borrow().is_selected(name));
            let filter = self.filter.clone();
            let on_filter = self.on_filter.clone();
            let name = name.clone();
            check.connect_toggled(move |_| {
                filter.borrow_mut().toggle_label(&name);
                emit(&on_filter, ());
            });
            self.label_box.append(&check);
        }
        *self.known_labels.borrow_mut() = names;
    }

    pub fn render(&self, chats: &[Conversation], selected: Option<&str>) {
        self.rendering.set(true);
        self.sync_label_toggles(label_names(chats));

        let filter = self.filter.borrow();
        if filter.has_labels() {
            self.filter_button.add_css_class("filter-active");
        } else {
            self.filter_button.remove_css_class("filter-active");
        }

        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        let rows = chat_rows(chats, &filter, selected, &Local);
        let mut ids = self.row_ids.borrow_mut();
        ids.clear();
        for row in &rows {
            let widget = build_row(row);
            self.list.append(&widget);
            if row.selected {
                self.list.select_row(Some(&widget));
            }
            ids.push(row.id.clone());
        }
        if rows.is_empty() {
            let empty = gtk::Label::new(Some(if chats.is_empty() { "No chats yet" } else { "No chats match" }));
            empty.add_css_class("dim-label");
            empty.set_margin_top(12);
            let row = gtk::ListBoxRow::new();
            row.set_selectable(false);
            row.set_child(Some(&empty));
            self.list.append(&row);
        }
        self.rendering.set(false);
    }
}
