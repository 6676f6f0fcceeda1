//! Configuration files driving backend selection and canvas creation

use std::io::Write;

use glcanvas::backend::{self, headless::HeadlessPlatform, xorg::XorgModel};
use glcanvas::event::no_handler;
use glcanvas::{AppConfig, Application, BackendFamily, Error};

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_opens_backend_and_canvas() {
    let file = write_config(
        r#"
        backend = "headless:gtk"

        [canvas]
        title = "from file"
        size = [640, 360]

        [canvas.gl]
        samples = 4
        depth_size = 24

        [loop]
        idle_wait_ms = 2
        "#,
    );
    let config = AppConfig::load(file.path()).unwrap();
    let app = backend::open_with(&config.backend, config.event_loop.clone()).unwrap();
    assert_eq!(app.family(), BackendFamily::Gtk);
    assert!(!app.capabilities().vsync);

    let canvas = app.create_canvas(config.canvas.clone(), no_handler()).unwrap();
    assert_eq!(canvas.size().unwrap(), (640, 360));
    app.process_events().unwrap();
    canvas.close().unwrap();
    app.quit();
}

#[test]
fn test_unsupported_gl_config_from_file() {
    let file = write_config(
        r#"
        [canvas.gl]
        samples = 3
        "#,
    );
    let config = AppConfig::load(file.path()).unwrap();
    let app = Application::new(HeadlessPlatform::<XorgModel>::new()).unwrap();
    let err = app.create_canvas(config.canvas, no_handler()).unwrap_err();
    assert!(matches!(err, Error::ContextCreationFailed(_)));
    assert!(app.canvases().is_empty());
}

#[test]
fn test_malformed_config_file() {
    let file = write_config("backend = [");
    assert!(matches!(AppConfig::load(file.path()), Err(Error::Config(_))));
}

#[test]
fn test_unknown_backend_in_config() {
    let file = write_config(r#"backend = "cocoa""#);
    let config = AppConfig::load(file.path()).unwrap();
    assert!(matches!(
        backend::open_with(&config.backend, config.event_loop),
        Err(Error::UnsupportedPlatform(_))
    ));
}
