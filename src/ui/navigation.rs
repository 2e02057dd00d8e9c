use std::rc::Rc;

use gtk4 as gtk;
use gtk4::prelude::*;

use crate::routes::Route;
use crate::view::nav::{NavItem, nav_items, settings_item};

pub struct NavigationRail {
    root: gtk::Box,
    buttons: Vec<(NavItem, gtk::Button)>,
}

fn rail_button(item: &NavItem, on_navigate: &Rc<dyn Fn(Route)>) -> gtk::Button {
    let btn = gtk::Button::from_icon_name(item.icon);
    btn.set_tooltip_text(Some(item.label));
    btn.add_css_class("flat");
    btn.add_css_class("circular");
    let route = item.route.clone();
    let on_navigate = on_navigate.clone();
    btn.connect_clicked(move |_| on_navigate(route.clone()));
    btn
}

impl NavigationRail {
    pub fn new(on_navigate: Rc<dyn Fn(Route)>) -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 8);
        root.set_margin_top(12);
        root.set_margin_bottom(12);
        root.set_margin_start(6);
        root.set_margin_end(6);

        let logo = gtk::Label::new(Some("P"));
        logo.add_css_class("app-logo");
        logo.set_margin_bottom(12);
        root.append(&logo);

        let mut buttons = Vec::new();
        for item in nav_items() {
            let btn = rail_button(&item, &on_navigate);
            root.append(&btn);
            buttons.push((item, btn));
        }

        let spacer = gtk::Box::new(gtk::Orientation::Vertical, 0);
        spacer.set_vexpand(true);
        root.append(&spacer);

        let settings = settings_item();
        let btn = rail_button(&settings, &on_navigate);
        root.append(&btn);
        buttons.push((settings, btn));

        Self { root, buttons }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn set_active(&self, current: &Route) {
        for (item, btn) in &self.buttons {
            if item.is_active(current) {
                btn.add_css_class("nav-active");
            } else {
                btn.remove_css_class("nav-active");
            }
        }
    }
}
