//! Window class, window procedure and the Win32 platform

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ffi::c_void;
use std::rc::Rc;

use log::{debug, info, warn};
use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::{BOOL, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, EnumDisplayMonitors, GetMonitorInfoW, ValidateRect, HDC, HMONITOR,
    MONITORINFO,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, VIRTUAL_KEY, VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AdjustWindowRectEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    GetClientRect, GetWindowLongPtrW, LoadCursorW, PeekMessageW, RegisterClassExW,
    SetWindowLongPtrW, SetWindowPos, SetWindowTextW, ShowWindow, TranslateMessage,
    CREATESTRUCTW, CS_HREDRAW, CS_OWNDC, CS_VREDRAW, CW_USEDEFAULT, GWLP_USERDATA, GWL_EXSTYLE,
    GWL_STYLE, HMENU, HWND_TOP, IDC_ARROW, MINMAXINFO, MSG, PM_REMOVE, SWP_FRAMECHANGED,
    SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SET_WINDOW_POS_FLAGS, SW_HIDE, SW_SHOW, WINDOW_EX_STYLE,
    WINDOW_STYLE, WM_GETMINMAXINFO, WM_NCCREATE, WNDCLASSEXW, WS_CLIPCHILDREN, WS_CLIPSIBLINGS,
    WS_MAXIMIZEBOX, WS_OVERLAPPEDWINDOW, WS_POPUP, WS_THICKFRAME, WS_VISIBLE,
};

use super::context::WglContext;
use super::input::{self, Win32Message, Win32Model};
use crate::backend::{NativeWindow, Platform, SurfaceRequest};
use crate::error::{Error, Result};
use crate::event::Modifiers;
use crate::geometry::{FrameExtents, Monitor};

const CLASS_NAME: PCWSTR = w!("glcanvas");

/// Messages forwarded to the event model
const FORWARDED: &[u32] = &[
    input::WM_SIZE,
    input::WM_PAINT,
    input::WM_CLOSE,
    input::WM_KILLFOCUS,
    input::WM_KEYDOWN,
    input::WM_KEYUP,
    input::WM_CHAR,
    input::WM_SYSKEYDOWN,
    input::WM_SYSKEYUP,
    input::WM_MOUSEMOVE,
    input::WM_LBUTTONDOWN,
    input::WM_LBUTTONUP,
    input::WM_RBUTTONDOWN,
    input::WM_RBUTTONUP,
    input::WM_MBUTTONDOWN,
    input::WM_MBUTTONUP,
    input::WM_MOUSEWHEEL,
    input::WM_MOUSEHWHEEL,
];

/// Per-window state reachable from the window procedure
#[derive(Default)]
struct WindowShared {
    queue: RefCell<VecDeque<Win32Message>>,
    /// Outer size pinned through `WM_GETMINMAXINFO`
    fixed_outer: Cell<Option<(i32, i32)>>,
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_NCCREATE {
        let create = lparam.0 as *const CREATESTRUCTW;
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, (*create).lpCreateParams as isize);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    let shared = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowShared;
    if shared.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    let shared = &*shared;

    if msg == WM_GETMINMAXINFO {
        if let Some((width, height)) = shared.fixed_outer.get() {
            let info = &mut *(lparam.0 as *mut MINMAXINFO);
            info.ptMinTrackSize = POINT { x: width, y: height };
            info.ptMaxTrackSize = POINT { x: width, y: height };
            return LRESULT(0);
        }
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }
    if !FORWARDED.contains(&msg) {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    match shared.queue.try_borrow_mut() {
        Ok(mut queue) => queue.push_back(Win32Message::new(msg, wparam.0, lparam.0)),
        Err(_) => warn!("Dropped window message 0x{:04x} while its queue was busy", msg),
    }
    match msg {
        input::WM_PAINT => {
            let _ = ValidateRect(hwnd, None);
            LRESULT(0)
        }
        // Closing is the canvas's decision
        input::WM_CLOSE => LRESULT(0),
        // Keep Alt+F4 and the system menu working
        input::WM_SYSKEYDOWN | input::WM_SYSKEYUP => DefWindowProcW(hwnd, msg, wparam, lparam),
        _ => LRESULT(0),
    }
}

unsafe extern "system" fn collect_monitor(
    monitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    data: LPARAM,
) -> BOOL {
    let monitors = &mut *(data.0 as *mut Vec<(bool, Monitor)>);
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    if GetMonitorInfoW(monitor, &mut info).as_bool() {
        let r = info.rcMonitor;
        monitors.push((
            info.dwFlags & 1 != 0,
            Monitor::new(
                format!("DISPLAY{}", monitors.len() + 1),
                (r.left, r.top),
                ((r.right - r.left).max(0) as u32, (r.bottom - r.top).max(0) as u32),
            ),
        ));
    }
    BOOL(1)
}

fn key_down(vk: VIRTUAL_KEY) -> bool {
    unsafe { GetKeyState(vk.0 as i32) < 0 }
}

/// Win32 + WGL platform
pub struct Win32Platform {
    instance: HINSTANCE,
}

impl Win32Platform {
    pub fn register() -> Result<Self> {
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|e| Error::UnsupportedPlatform(e.to_string()))?;
        let instance = module.into();
        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_OWNDC | CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            hCursor: unsafe { LoadCursorW(HINSTANCE::default(), IDC_ARROW) }.unwrap_or_default(),
            lpszClassName: CLASS_NAME,
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&class) } == 0 {
            return Err(Error::UnsupportedPlatform(format!(
                "cannot register window class: {}",
                windows::core::Error::from_win32()
            )));
        }
        info!("Registered Win32 window class");
        Ok(Self { instance })
    }
}

impl Platform for Win32Platform {
    type Model = Win32Model;
    type Window = Win32Window;
    type Context = WglContext;

    fn name(&self) -> &str {
        "win32"
    }

    fn monitors(&self) -> Vec<Monitor> {
        let mut found: Vec<(bool, Monitor)> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(collect_monitor),
                LPARAM(&mut found as *mut _ as isize),
            );
        }
        // Primary first
        found.sort_by_key(|(primary, _)| !*primary);
        found.into_iter().map(|(_, m)| m).collect()
    }

    fn create_surface(
        &self,
        request: &SurfaceRequest<'_>,
        share: Option<&WglContext>,
    ) -> Result<(Win32Window, WglContext)> {
        let window = Win32Window::create(self, request)?;
        let context = WglContext::create(window.hwnd, request, share)?;
        Ok((window, context))
    }

    fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        if key_down(VK_SHIFT) {
            mods |= Modifiers::SHIFT;
        }
        if key_down(VK_CONTROL) {
            mods |= Modifiers::CONTROL;
        }
        if key_down(VK_MENU) {
            mods |= Modifiers::ALT;
        }
        if key_down(VK_LWIN) || key_down(VK_RWIN) {
            mods |= Modifiers::META;
        }
        mods
    }

    /// Drain the thread's message queue into the window procedures
    fn pump(&self) -> Result<()> {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        Ok(())
    }

    fn ignored_gl_fields(&self) -> &'static [crate::config::GlField] {
        super::IGNORED_GL_FIELDS
    }

    fn native_handle(&self) -> &dyn Any {
        self
    }
}

/// One top-level window
pub struct Win32Window {
    pub(super) hwnd: HWND,
    shared: Rc<WindowShared>,
    windowed_style: Cell<Option<isize>>,
}

impl Win32Window {
    fn create(platform: &Win32Platform, request: &SurfaceRequest<'_>) -> Result<Self> {
        let mut style = if request.decorated {
            WS_OVERLAPPEDWINDOW
        } else {
            WS_POPUP
        };
        if !request.resizable {
            style = style & !(WS_THICKFRAME | WS_MAXIMIZEBOX);
        }
        let style = style | WS_CLIPCHILDREN | WS_CLIPSIBLINGS;

        let (width, height) = request.size;
        let mut rect = RECT {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        };
        unsafe { AdjustWindowRectEx(&mut rect, style, false, WINDOW_EX_STYLE::default()) }
            .map_err(|e| Error::WindowCreationFailed(e.to_string()))?;
        let (x, y) = match request.position {
            Some((x, y)) => (x + rect.left, y + rect.top),
            None => (CW_USEDEFAULT, CW_USEDEFAULT),
        };

        let shared = Rc::new(WindowShared::default());
        let title = HSTRING::from(request.title);
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                CLASS_NAME,
                &title,
                style,
                x,
                y,
                rect.right - rect.left,
                rect.bottom - rect.top,
                HWND::default(),
                HMENU::default(),
                platform.instance,
                Some(Rc::as_ptr(&shared) as *const c_void),
            )
        }
        .map_err(|e| Error::WindowCreationFailed(e.to_string()))?;
        debug!("Created window {:?}", hwnd);

        Ok(Self {
            hwnd,
            shared,
            windowed_style: Cell::new(None),
        })
    }

    fn style(&self) -> WINDOW_STYLE {
        WINDOW_STYLE(unsafe { GetWindowLongPtrW(self.hwnd, GWL_STYLE) } as u32)
    }

    fn ex_style(&self) -> WINDOW_EX_STYLE {
        WINDOW_EX_STYLE(unsafe { GetWindowLongPtrW(self.hwnd, GWL_EXSTYLE) } as u32)
    }

    fn set_window_pos(&self, after: HWND, rect: (i32, i32, i32, i32), flags: SET_WINDOW_POS_FLAGS) -> Result<()> {
        let (x, y, w, h) = rect;
        unsafe { SetWindowPos(self.hwnd, after, x, y, w, h, flags) }
            .map_err(|e| Error::Native(e.to_string()))
    }
}

impl NativeWindow for Win32Window {
    type Event = Win32Message;

    fn frame_extents(&self) -> FrameExtents {
        let mut rect = RECT::default();
        if unsafe { AdjustWindowRectEx(&mut rect, self.style(), false, self.ex_style()) }.is_err() {
            return FrameExtents::NONE;
        }
        FrameExtents::new(
            (-rect.left).max(0) as u32,
            (-rect.top).max(0) as u32,
            rect.right.max(0) as u32,
            rect.bottom.max(0) as u32,
        )
    }

    fn set_title(&self, title: &str) -> Result<()> {
        unsafe { SetWindowTextW(self.hwnd, &HSTRING::from(title)) }
            .map_err(|e| Error::Native(e.to_string()))
    }

    fn set_outer_size(&self, (width, height): (u32, u32)) -> Result<()> {
        self.set_window_pos(
            HWND::default(),
            (0, 0, width as i32, height as i32),
            SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE,
        )
    }

    fn set_outer_position(&self, (x, y): (i32, i32)) -> Result<()> {
        self.set_window_pos(HWND::default(), (x, y, 0, 0), SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE)
    }

    fn inner_size(&self) -> (u32, u32) {
        let mut rect = RECT::default();
        let _ = unsafe { GetClientRect(self.hwnd, &mut rect) };
        (
            (rect.right - rect.left).max(0) as u32,
            (rect.bottom - rect.top).max(0) as u32,
        )
    }

    fn inner_position(&self) -> (i32, i32) {
        let mut point = POINT { x: 0, y: 0 };
        let _ = unsafe { ClientToScreen(self.hwnd, &mut point) };
        (point.x, point.y)
    }

    fn set_visible(&self, visible: bool) -> Result<()> {
        let command = if visible { SW_SHOW } else { SW_HIDE };
        let _ = unsafe { ShowWindow(self.hwnd, command) };
        Ok(())
    }

    fn set_fullscreen(&self, monitor: Option<&Monitor>) -> Result<()> {
        match monitor {
            Some(monitor) => {
                if self.windowed_style.get().is_none() {
                    self.windowed_style
                        .set(Some(unsafe { GetWindowLongPtrW(self.hwnd, GWL_STYLE) }));
                }
                let style = (WS_POPUP | WS_VISIBLE | WS_CLIPCHILDREN | WS_CLIPSIBLINGS).0 as isize;
                unsafe { SetWindowLongPtrW(self.hwnd, GWL_STYLE, style) };
                let (x, y) = monitor.position;
                let (w, h) = monitor.size;
                self.set_window_pos(HWND_TOP, (x, y, w as i32, h as i32), SWP_FRAMECHANGED | SWP_NOACTIVATE)
            }
            None => {
                let Some(style) = self.windowed_style.take() else {
                    return Ok(());
                };
                unsafe { SetWindowLongPtrW(self.hwnd, GWL_STYLE, style) };
                self.set_window_pos(
                    HWND::default(),
                    (0, 0, 0, 0),
                    SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE,
                )
            }
        }
    }

    fn set_fixed_size(&self, size: Option<(u32, u32)>) -> Result<()> {
        match size {
            Some((width, height)) => {
                let (w, h) = self.frame_extents().client_to_window(width, height);
                self.shared.fixed_outer.set(Some((w as i32, h as i32)));
                self.set_outer_size((w, h))
            }
            None => {
                self.shared.fixed_outer.set(None);
                Ok(())
            }
        }
    }

    fn drain_events(&self, out: &mut Vec<Win32Message>) {
        if let Ok(mut queue) = self.shared.queue.try_borrow_mut() {
            out.extend(queue.drain(..));
        }
    }
}

impl Drop for Win32Window {
    fn drop(&mut self) {
        if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
            warn!("DestroyWindow failed: {}", e);
        }
        debug!("Destroyed window {:?}", self.hwnd);
    }
}
