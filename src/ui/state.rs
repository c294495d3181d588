use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use winit::keyboard::{ModifiersState, NamedKey};

use crate::cli::{HELP_KEYS, KEYS_TIP};
use crate::config::ViewerConfig;
use crate::controller::{Notice, Phase, ViewerController};
use crate::fetcher::FetchLauncher;
use crate::ui::render::{
    blit_fit, draw_text, fill_rect, palette, rgb, text_width, GLYPH_HEIGHT,
};

const RETRY_DELAY: Duration = Duration::from_secs(5);
const TEXT_SCALE: u32 = 2;

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

pub struct ViewState<L> {
    pub controller: ViewerController<L>,
    pub config_path: PathBuf,
    pub status: String,
    pub show_help: bool,
    /// When to retry after the cache ran dry.
    pub retry_at: Option<Instant>,

    pub modifiers: ModifiersState,
    // Keys that were pressed since the last update
    pub keys_pressed: HashSet<NamedKey>,
    pub chars_pressed: HashSet<char>,
}

impl<L: FetchLauncher> ViewState<L> {
    pub fn new(controller: ViewerController<L>, config_path: PathBuf) -> Self {
        Self {
            controller,
            config_path,
            status: "Ready".to_string(),
            show_help: false,
            retry_at: None,
            modifiers: ModifiersState::empty(),
            keys_pressed: HashSet::new(),
            chars_pressed: HashSet::new(),
        }
    }

    fn ctrl(&self) -> bool {
        self.modifiers.control_key() || self.modifiers.super_key()
    }

    fn pressed(&self, k: NamedKey) -> bool {
        self.keys_pressed.contains(&k)
    }

    fn char_pressed(&self, c: char) -> bool {
        self.chars_pressed.contains(&c)
    }

    /// Show a controller notice in the status bar.
    pub fn apply(&mut self, notice: Notice) {
        match &notice {
            Notice::Exhausted(_) => self.retry_at = Some(Instant::now() + RETRY_DELAY),
            Notice::Fresh { .. } | Notice::Repeated { .. } | Notice::Cached { .. } => {
                self.retry_at = None
            }
            _ => {}
        }
        self.status = notice.to_string();
    }

    /// Fire the pending retry if it is due. Returns true if something changed.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        match self.retry_at {
            Some(when) if now >= when => {
                self.retry_at = None;
                if let Some(notice) = self.controller.retry() {
                    log::info!("retrying after exhausted cache");
                    self.apply(notice);
                }
                true
            }
            _ => false,
        }
    }

    fn reload_config(&mut self) {
        match ViewerConfig::load_from(&self.config_path) {
            Ok(mut cfg) => {
                cfg.sanitize();
                let notice = self.controller.reconfigure(cfg);
                self.apply(notice);
            }
            Err(e) => {
                log::warn!("config reload failed: {}", e);
                self.status = format!("Config reload failed: {}", e);
            }
        }
    }

    fn toggle_theme(&mut self) {
        let mut cfg = self.controller.config().clone();
        cfg.theme = cfg.theme.toggled();
        if let Err(e) = cfg.save_to(&self.config_path) {
            log::warn!("could not persist theme: {}", e);
        }
        let notice = self.controller.reconfigure(cfg);
        self.apply(notice);
    }

    /// Handle the keys pressed since the last frame.
    /// Returns true if the app should quit.
    pub fn update(&mut self) -> bool {
        let ctrl = self.ctrl();

        if self.pressed(NamedKey::Escape) || self.char_pressed('q') {
            return true;
        }

        if self.pressed(NamedKey::Space)
            || self.pressed(NamedKey::ArrowRight)
            || self.char_pressed('d')
        {
            let notice = self.controller.next();
            self.apply(notice);
        } else if self.pressed(NamedKey::ArrowLeft) || self.char_pressed('a') {
            let notice = self.controller.previous();
            self.apply(notice);
        }

        if ctrl && self.char_pressed('s') {
            let notice = match self.controller.download_current() {
                Ok(saved) => Notice::Saved {
                    path: saved.path.display().to_string(),
                    fell_back: saved.fell_back,
                },
                Err(e) => {
                    log::error!("save failed: {}", e);
                    Notice::SaveFailed(e.to_string())
                }
            };
            self.apply(notice);
        }

        if self.char_pressed('c') {
            let notice = match self.controller.copy_current() {
                Ok(()) => Notice::Copied,
                Err(e) => Notice::CopyFailed(e.to_string()),
            };
            self.apply(notice);
        }

        if !ctrl && self.char_pressed('r') {
            self.reload_config();
        }
        if !ctrl && self.char_pressed('t') {
            self.toggle_theme();
        }
        if self.char_pressed('?') {
            self.show_help = !self.show_help;
        }

        self.keys_pressed.clear();
        self.chars_pressed.clear();
        false
    }

    pub fn title(&self) -> String {
        match self.controller.current() {
            Some(rec) => {
                let f = rec.frame();
                format!(
                    "randview - {} ({} {}x{})",
                    rec.source_url(),
                    f.format_name(),
                    f.width,
                    f.height
                )
            }
            None => "randview".to_string(),
        }
    }

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) {
        let pal = palette(self.controller.config().theme);
        let [r, g, b] = pal.background;
        frame.fill(rgb(r, g, b));

        let line_h = GLYPH_HEIGHT * TEXT_SCALE + 8;
        let bar_h = line_h.min(fb_h);
        let image_h = fb_h - bar_h;

        let current = self.controller.current();
        if let Some(rec) = current {
            let f = rec.frame();
            blit_fit(frame, fb_w, image_h, &f.rgba, f.width, f.height);
        }

        // Centre overlay
        let overlay = match self.controller.phase() {
            Phase::Loading => Some(("Loading...", pal.text)),
            Phase::Empty if current.is_none() && self.retry_at.is_some() => {
                Some(("No image available.", pal.error))
            }
            Phase::ShuttingDown => Some(("Shutting down...", pal.text)),
            _ => None,
        };
        if let Some((msg, color)) = overlay {
            let w = text_width(msg, TEXT_SCALE);
            let tx = (fb_w as i32 - w as i32) / 2;
            let ty = image_h as i32 / 2;
            if current.is_some() {
                fill_rect(frame, fb_w, fb_h, tx - 10, ty - 10, w + 20, line_h + 12, (0, 0, 0, 128));
            }
            draw_text(frame, fb_w, fb_h, msg, tx, ty, TEXT_SCALE, color);
        }

        // Status bar
        let cache = self.controller.cache();
        let counters = format!("[{}+{}/{}]", cache.len(), cache.in_flight(), cache.capacity());
        fill_rect(frame, fb_w, fb_h, 0, image_h as i32, fb_w, bar_h, pal.bar);
        let ty = image_h as i32 + 4;
        let x = draw_text(frame, fb_w, fb_h, &counters, 8, ty, TEXT_SCALE, pal.dim_text);
        let line = format!("{} | {}", self.status, KEYS_TIP);
        draw_text(frame, fb_w, fb_h, &line, x + 12, ty, TEXT_SCALE, pal.text);

        if self.show_help {
            fill_rect(frame, fb_w, fb_h, 0, 0, fb_w, image_h, (0, 0, 0, 200));
            let mut y = 20;
            for line in HELP_KEYS.lines() {
                draw_text(frame, fb_w, fb_h, line, 20, y, TEXT_SCALE, (255, 255, 255, 255));
                y += line_h as i32 + 4;
            }
        }
    }
}
