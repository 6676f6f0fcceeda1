//! End-to-end canvas behaviour against the headless driver

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use glcanvas::backend::game::input::{self as game, GameEvent, GameModel};
use glcanvas::backend::gtk::input::{GtkEvent, GtkModel};
use glcanvas::backend::headless::{HeadlessModel, HeadlessPlatform};
use glcanvas::backend::win32::input::{self as win32, Win32Message, Win32Model};
use glcanvas::backend::xorg::input::{XorgEvent, XorgModel};
use glcanvas::event::downgrade;
use glcanvas::{
    Application, CanvasConfig, CanvasEvent, CanvasId, Error, Fullscreen, FrameExtents, GlContext,
    Key, Modifiers,
};

type Log = Rc<RefCell<Vec<CanvasEvent>>>;

fn recorder() -> (Log, Rc<impl Fn(CanvasId, &CanvasEvent)>) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let handler = Rc::new(move |_: CanvasId, event: &CanvasEvent| {
        sink.borrow_mut().push(event.clone())
    });
    (log, handler)
}

fn app<M: HeadlessModel>() -> Application<HeadlessPlatform<M>> {
    Application::new(HeadlessPlatform::new()).unwrap()
}

#[test]
fn test_initialize_then_resize() {
    let app = app::<XorgModel>();
    let (log, handler) = recorder();
    let config = CanvasConfig {
        size: (800, 600),
        show: true,
        ..CanvasConfig::default()
    };
    let _canvas = app.create_canvas(config, downgrade(&handler)).unwrap();
    app.process_events().unwrap();

    let log = log.borrow();
    assert!(log.len() >= 2);
    assert_eq!(log[0], CanvasEvent::Initialize);
    assert_eq!(log[1], CanvasEvent::Resize { size: (800, 600) });
    assert!(log[2..].iter().all(|e| e.kind() == "paint"));
}

#[test]
fn test_shared_contexts_see_each_others_objects() {
    let app = app::<XorgModel>();
    let gl = GlContext::default();
    let config = CanvasConfig {
        context: gl.clone(),
        ..CanvasConfig::default()
    };
    let a = app.create_canvas(config.clone(), glcanvas::event::no_handler()).unwrap();
    let b = app.create_canvas(config, glcanvas::event::no_handler()).unwrap();

    a.set_current().unwrap();
    let name = a.with_context(|c| c.native().gen_object()).unwrap().unwrap();
    a.swap_buffers().unwrap();

    b.set_current().unwrap();
    assert!(b.with_context(|c| c.native().has_object(name)).unwrap().unwrap());
    b.swap_buffers().unwrap();
    assert!(a
        .with_context(|ca| b.with_context(|cb| ca.shares_with(cb)).unwrap())
        .unwrap());
}

#[test]
fn test_group_outlives_first_canvas() {
    let app = app::<XorgModel>();
    let (log_b, handler_b) = recorder();
    let gl = GlContext::default();
    let config = CanvasConfig {
        context: gl.clone(),
        ..CanvasConfig::default()
    };
    let a = app.create_canvas(config.clone(), glcanvas::event::no_handler()).unwrap();
    let b = app.create_canvas(config, downgrade(&handler_b)).unwrap();

    a.set_current().unwrap();
    let name = a.with_context(|c| c.native().gen_object()).unwrap().unwrap();
    a.close().unwrap();
    assert!(a.is_closed());

    b.swap_buffers().unwrap();
    assert!(b.with_context(|c| c.native().has_object(name)).unwrap().unwrap());
    assert!(!log_b.borrow().contains(&CanvasEvent::Close));

    b.close().unwrap();
    assert!(matches!(b.swap_buffers(), Err(Error::CanvasClosed)));
}

#[test]
fn test_sharing_across_families_is_refused() {
    let native = app::<XorgModel>();
    let toolkit = app::<GtkModel>();
    let gl = GlContext::default();
    let config = CanvasConfig {
        context: gl.clone(),
        ..CanvasConfig::default()
    };
    let _first = native.create_canvas(config.clone(), glcanvas::event::no_handler()).unwrap();
    let err = toolkit
        .create_canvas(config, glcanvas::event::no_handler())
        .unwrap_err();
    assert!(matches!(err, Error::IncompatibleShare { .. }));
    assert!(!toolkit.has_open_canvas());
}

#[test]
fn test_set_size_then_get_size() {
    let app = app::<XorgModel>();
    let canvas = app
        .create_canvas(CanvasConfig::default(), glcanvas::event::no_handler())
        .unwrap();
    for size in [(320, 240), (1024, 768), (1, 1), (640, 480)] {
        canvas.set_size(size.0, size.1).unwrap();
        assert_eq!(canvas.size().unwrap(), size);
    }
}

#[test]
fn test_set_size_while_fullscreen_is_rejected() {
    let app = app::<XorgModel>();
    let canvas = app
        .create_canvas(CanvasConfig::default(), glcanvas::event::no_handler())
        .unwrap();
    canvas.set_fullscreen(Fullscreen::Primary).unwrap();
    let before = canvas.size().unwrap();
    assert!(matches!(
        canvas.set_size(100, 100),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(canvas.size().unwrap(), before);
    assert_eq!(before, (1920, 1080));

    canvas.set_fullscreen(Fullscreen::Off).unwrap();
    assert_eq!(canvas.size().unwrap(), (800, 600));
}

#[test]
fn test_client_window_round_trip() {
    let extents = FrameExtents::new(3, 24, 5, 7);
    let app = Application::new(HeadlessPlatform::<XorgModel>::new().with_frame_extents(extents))
        .unwrap();
    let canvas = app
        .create_canvas(CanvasConfig::default(), glcanvas::event::no_handler())
        .unwrap();
    for (w, h) in [(0, 0), (1, 1), (800, 600), (4096, 2160)] {
        let outer = canvas.client_to_window(w, h).unwrap();
        assert_eq!(outer, (w + 8, h + 31));
        assert_eq!(extents.window_to_client(outer.0, outer.1), (w, h));
    }
    for (x, y) in [(0, 0), (-50, 20), (1920, 1080)] {
        let outer = canvas.client_to_window_pos(x, y).unwrap();
        assert_eq!(extents.window_to_client_pos(outer.0, outer.1), (x, y));
    }

    canvas.set_position(200, 150).unwrap();
    canvas.set_size(500, 400).unwrap();
    assert_eq!(canvas.position().unwrap(), (200, 150));
    assert_eq!(canvas.size().unwrap(), (500, 400));
}

fn key_events<M: HeadlessModel>(events: Vec<M::Event>) -> Vec<CanvasEvent> {
    let app = app::<M>();
    let (log, handler) = recorder();
    let canvas = app
        .create_canvas(CanvasConfig::default(), downgrade(&handler))
        .unwrap();
    app.process_events().unwrap();
    canvas
        .with_native(move |w| {
            for event in events {
                w.inject(event);
            }
        })
        .unwrap();
    app.process_events().unwrap();
    let keys = log
        .borrow()
        .iter()
        .filter(|e| e.kind().starts_with("key_"))
        .cloned()
        .collect();
    keys
}

#[test]
fn test_escape_is_the_same_key_everywhere() {
    let expected = vec![
        CanvasEvent::KeyPress {
            key: Some(Key::Escape),
            text: String::new(),
            modifiers: Modifiers::empty(),
        },
        CanvasEvent::KeyRelease {
            key: Some(Key::Escape),
            text: String::new(),
            modifiers: Modifiers::empty(),
        },
    ];

    let xorg = key_events::<XorgModel>(vec![
        XorgEvent::Key {
            pressed: true,
            keycode: 9,
            keysym: 0xff1b,
            state: 0,
            text: "\u{1b}".to_string(),
        },
        XorgEvent::Key {
            pressed: false,
            keycode: 9,
            keysym: 0xff1b,
            state: 0,
            text: String::new(),
        },
    ]);
    let gtk = key_events::<GtkModel>(vec![
        GtkEvent::Key {
            pressed: true,
            keyval: 0xff1b,
            hardware_keycode: 9,
            state: 0,
        },
        GtkEvent::Key {
            pressed: false,
            keyval: 0xff1b,
            hardware_keycode: 9,
            state: 0,
        },
    ]);
    let win32 = key_events::<Win32Model>(vec![
        Win32Message::new(win32::WM_KEYDOWN, 0x1b, 1),
        Win32Message::new(win32::WM_CHAR, 0x1b, 1),
        Win32Message::new(win32::WM_KEYUP, 0x1b, 1),
    ]);
    let game = key_events::<GameModel>(vec![
        GameEvent::Key {
            key: 256,
            scancode: 9,
            action: game::PRESS,
            mods: 0,
        },
        GameEvent::Key {
            key: 256,
            scancode: 9,
            action: game::RELEASE,
            mods: 0,
        },
    ]);

    assert_eq!(xorg, expected);
    assert_eq!(gtk, expected);
    assert_eq!(win32, expected);
    assert_eq!(game, expected);
}

/// Press, focus moves away before the release, then a fresh press and release
fn lost_release_events<M: HeadlessModel>(press: M::Event, release: M::Event) -> Vec<&'static str>
where
    M::Event: Clone,
{
    let app = app::<M>();
    let (log, handler) = recorder();
    let canvas = app
        .create_canvas(CanvasConfig::default(), downgrade(&handler))
        .unwrap();
    canvas
        .with_native(|w| {
            w.inject(press.clone());
            w.lose_focus();
        })
        .unwrap();
    app.process_events().unwrap();
    canvas
        .with_native(|w| {
            w.inject(press);
            w.inject(release);
        })
        .unwrap();
    app.process_events().unwrap();
    let kinds = log
        .borrow()
        .iter()
        .map(|e| e.kind())
        .filter(|k| k.starts_with("key_"))
        .collect();
    kinds
}

#[test]
fn test_press_after_focus_loss_is_delivered() {
    let expected = vec!["key_press", "key_press", "key_release"];
    let xorg_key = |pressed| XorgEvent::Key {
        pressed,
        keycode: 38,
        keysym: 0x61,
        state: 0,
        text: if pressed { "a".into() } else { String::new() },
    };
    assert_eq!(
        lost_release_events::<XorgModel>(xorg_key(true), xorg_key(false)),
        expected
    );
    let gtk_key = |pressed| GtkEvent::Key {
        pressed,
        keyval: 0xff1b,
        hardware_keycode: 9,
        state: 0,
    };
    assert_eq!(
        lost_release_events::<GtkModel>(gtk_key(true), gtk_key(false)),
        expected
    );
    assert_eq!(
        lost_release_events::<Win32Model>(
            Win32Message::new(win32::WM_KEYDOWN, 0x1b, 1),
            Win32Message::new(win32::WM_KEYUP, 0x1b, 1),
        ),
        expected
    );
    let game_key = |action| GameEvent::Key {
        key: 256,
        scancode: 9,
        action,
        mods: 0,
    };
    assert_eq!(
        lost_release_events::<GameModel>(game_key(game::PRESS), game_key(game::RELEASE)),
        expected
    );
}

#[test]
fn test_timer_fires_once_per_interval() {
    let app = app::<XorgModel>();
    let count = Rc::new(Cell::new(0u32));
    let c = count.clone();
    let timer = app.create_timer(Box::new(move || {
        c.set(c.get() + 1);
        Ok(())
    }));

    let interval = Duration::from_millis(10);
    let period = Duration::from_millis(105);
    timer.start(interval).unwrap();
    let started = Instant::now();
    while started.elapsed() < period {
        app.process_events().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    let fired = count.get();
    assert!((9..=11).contains(&fired), "fired {fired} times");

    timer.stop();
    for _ in 0..20 {
        app.process_events().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(count.get(), fired);
}

#[test]
fn test_double_close_fires_close_once() {
    let app = app::<XorgModel>();
    let (log, handler) = recorder();
    let canvas = app
        .create_canvas(CanvasConfig::default(), downgrade(&handler))
        .unwrap();
    canvas.close().unwrap();
    canvas.close().unwrap();
    app.process_events().unwrap();
    let closes = log.borrow().iter().filter(|e| **e == CanvasEvent::Close).count();
    assert_eq!(closes, 1);
    assert!(matches!(canvas.set_title("x"), Err(Error::CanvasClosed)));
}

#[test]
fn test_native_close_request_then_close() {
    let app = app::<GameModel>();
    let (log, handler) = recorder();
    let canvas = app
        .create_canvas(CanvasConfig::default(), downgrade(&handler))
        .unwrap();
    canvas.with_native(|w| w.request_close()).unwrap();
    app.process_events().unwrap();
    assert!(canvas.is_closed());
    canvas.close().unwrap();
    let closes = log.borrow().iter().filter(|e| **e == CanvasEvent::Close).count();
    assert_eq!(closes, 1);
    assert!(!app.has_open_canvas());
}
