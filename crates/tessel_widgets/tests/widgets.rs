//! Widget controllers driven the way a rendering layer drives them

use std::cell::RefCell;
use std::rc::Rc;

use tessel_core::host::testing::RecordingHost;
use tessel_core::{
    DescendantRegistry, ItemMeta, Key, ManualClock, Point, Rect, RuntimeConfig, SharedRegistry,
};
use tessel_widgets::{
    tooltips_suppressed, Accordion, AccordionConfig, Capabilities, Combobox, ComboboxConfig,
    ComboboxState, MenuButton, MenuButtonConfig, Slider, SliderConfig, Tabs, TabsConfig,
};

const INPUT: u64 = 100;
const POPOVER: u64 = 200;
const BUTTON: u64 = 300;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn items(host: &Rc<RecordingHost>, names: &[&str], parent: Option<u64>) -> SharedRegistry<u64, ItemMeta> {
    let registry = DescendantRegistry::shared(host.clone());
    for (i, name) in names.iter().enumerate() {
        let handle = i as u64 + 1;
        host.mount(handle, handle);
        if let Some(parent) = parent {
            host.set_parent(handle, parent);
        }
        registry
            .borrow_mut()
            .register(handle, false, ItemMeta::new(*name), None)
            .unwrap();
    }
    registry
}

#[test]
fn combobox_click_inside_popover_beats_pending_blur() {
    init_tracing();
    let host = Rc::new(RecordingHost::new());
    let registry = items(&host, &["Apple", "Banana", "Cherry"], Some(POPOVER));
    let caps = Capabilities::new(host.clone(), ManualClock::shared());
    let mut combobox = Combobox::new(caps, registry, ComboboxConfig::new()).unwrap();
    combobox.set_input(INPUT);
    combobox.set_popover(POPOVER);

    let selected = Rc::new(RefCell::new(Vec::new()));
    let sink = selected.clone();
    combobox.on_select(move |value| sink.borrow_mut().push(value.to_string()));

    combobox.input_changed("b");
    combobox.blur();
    assert!(combobox.has_pending_blur());

    // Pointer down on the second option moves focus into the popover
    combobox.focus_moved(&2);
    assert!(!combobox.has_pending_blur());
    assert_eq!(combobox.state(), ComboboxState::Interacting);

    combobox.click_option("Banana");
    assert_eq!(combobox.tick(), 0);
    assert_eq!(combobox.state(), ComboboxState::Idle);
    assert_eq!(combobox.value(), "Banana");
    assert_eq!(*selected.borrow(), vec!["Banana".to_string()]);

    combobox.paint();
    assert_eq!(host.last_focused(), Some(INPUT));
}

#[test]
fn combobox_blur_lands_after_a_tick() {
    init_tracing();
    let host = Rc::new(RecordingHost::new());
    let registry = items(&host, &["Apple", "Banana"], Some(POPOVER));
    let caps = Capabilities::new(host.clone(), ManualClock::shared());
    let mut combobox = Combobox::new(caps, registry, ComboboxConfig::new()).unwrap();
    combobox.set_input(INPUT);
    combobox.set_popover(POPOVER);

    combobox.input_changed("a");
    combobox.blur();
    // Focus went somewhere unrelated
    combobox.focus_moved(&999);
    assert_eq!(combobox.state(), ComboboxState::Suggesting);

    assert_eq!(combobox.tick(), 1);
    assert_eq!(combobox.state(), ComboboxState::Idle);
    assert!(!combobox.is_expanded());
}

#[test]
fn menu_confirms_after_delay_and_restores_tooltips() {
    init_tracing();
    let host = Rc::new(RecordingHost::new());
    let clock = ManualClock::shared();
    let registry = DescendantRegistry::shared(host.clone());
    let config = RuntimeConfig::from_toml_str("menu_select_delay_ms = 40").unwrap();
    let caps = Capabilities::new(host.clone(), clock.clone()).with_config(config);
    let mut menu = MenuButton::new(caps, registry, MenuButtonConfig::new()).unwrap();
    menu.set_button(BUTTON);

    let chosen = Rc::new(RefCell::new(Vec::new()));
    for (i, action) in ["Copy", "Cut", "Paste"].into_iter().enumerate() {
        let handle = i as u64 + 1;
        host.mount(handle, handle);
        let sink = chosen.clone();
        menu.add_item(handle, ItemMeta::new(action), false, move || {
            sink.borrow_mut().push(action)
        })
        .unwrap();
    }

    assert!(menu.key_down(Key::Down));
    assert!(menu.is_open());
    assert!(tooltips_suppressed());

    menu.key_down(Key::Char('p'));
    menu.key_down(Key::Enter);
    assert!(!menu.is_open());
    assert!(!tooltips_suppressed());
    assert!(chosen.borrow().is_empty());

    clock.advance_ms(40);
    assert_eq!(menu.poll(), 1);
    assert_eq!(*chosen.borrow(), vec!["Paste"]);

    menu.paint();
    assert_eq!(host.last_focused(), Some(BUTTON));
}

#[test]
fn controlled_tabs_follow_the_same_path_as_clicks() {
    init_tracing();
    let names = ["Overview", "Specs", "Reviews"];

    let host = Rc::new(RecordingHost::new());
    let caps = Capabilities::new(host.clone(), ManualClock::shared());
    let mut uncontrolled = Tabs::new(caps.clone(), items(&host, &names, None), TabsConfig::new()).unwrap();
    let mut controlled =
        Tabs::new(caps, items(&host, &names, None), TabsConfig::new().selected(0)).unwrap();

    uncontrolled.click_tab(2);
    controlled.click_tab(2);
    assert_eq!(controlled.selected(), 0);

    controlled.sync_selected(Some(2)).unwrap();
    assert_eq!(uncontrolled.machine().context(), controlled.machine().context());
    assert_eq!(uncontrolled.state(), controlled.state());
}

#[test]
fn accordion_wraps_when_configured() {
    init_tracing();
    let host = Rc::new(RecordingHost::new());
    let registry = items(&host, &["One", "Two", "Three"], None);
    let config = RuntimeConfig::from_toml_str("rotate_navigation = true").unwrap();
    let caps = Capabilities::new(host.clone(), ManualClock::shared()).with_config(config);
    let mut accordion = Accordion::new(caps, registry, AccordionConfig::new().multiple()).unwrap();

    accordion.focus_header(2);
    accordion.key_down(Key::Down);
    assert_eq!(accordion.focused(), Some(0));
    accordion.key_down(Key::Space);
    accordion.toggle(1);
    assert_eq!(accordion.open_panels(), &[0, 1]);
}

#[test]
fn slider_drag_then_keyboard() {
    init_tracing();
    let host = Rc::new(RecordingHost::new());
    host.set_rect(7, Rect::new(0.0, 0.0, 400.0, 8.0));
    let caps = Capabilities::new(host.clone(), ManualClock::shared());
    let mut slider = Slider::new(caps, SliderConfig::new().min(0.0).max(1.0).step(0.05)).unwrap();
    slider.set_track(7);

    slider.pointer_down(Point::new(101.0, 4.0)).unwrap();
    assert_eq!(slider.value(), 0.25);
    slider.pointer_move(Point::new(300.0, 4.0));
    slider.pointer_up();
    assert_eq!(slider.value(), 0.75);

    slider.key_down(Key::Right);
    assert_eq!(slider.value(), 0.8);
}
