//! SDL2 front-end. Text is drawn from the font sub-file of the graphics archive, a strip of 8x14
//! glyphs indexed by character code.

use crate::config::Config;
use crate::session::{Banner, Input, Presenter, Session, Step};
use crate::subsystems::HostEntry;

use libdiscboot::handoff::Subsystem;
use libdiscboot::menu::MenuState;

use sdl2::event::Event;
use sdl2::image::{ImageRWops, INIT_PNG};
use sdl2::keyboard::Keycode;
use sdl2::pixels::Color;
use sdl2::rect::Rect;
use sdl2::render::{Texture, WindowCanvas};
use sdl2::rwops::RWops;
use sdl2::EventPump;

use log::{info, warn};
use std::time::Duration;

const GLYPH_WIDTH: u32 = 8;
const GLYPH_HEIGHT: u32 = 14;
const RENDER_WIDTH: u32 = 640;
const RENDER_HEIGHT: u32 = 350;
const COLUMNS: usize = (RENDER_WIDTH / GLYPH_WIDTH) as usize;
const LIST_TOP: i32 = 3;
const LIST_ROWS: usize = 20;
const FRAME: Duration = Duration::from_millis(16);

fn scaled(colour: (u8, u8, u8), brightness: u8) -> Color {
	let scale = |c: u8| (c as u32 * brightness as u32 / 255) as u8;
	Color::RGB(scale(colour.0), scale(colour.1), scale(colour.2))
}

pub struct SdlPresenter<'t> {
	canvas: WindowCanvas,
	font: Option<Texture<'t>>,
	events: EventPump,
	quit_requested: bool,
}

impl<'t> SdlPresenter<'t> {
	fn draw_text(&mut self, text: &str, column: i32, row: i32, colour: (u8, u8, u8), brightness: u8) {
		let font = match self.font {
			Some(ref mut font) => font,
			None => return,
		};
		let fore = scaled(colour, brightness);
		font.set_color_mod(fore.r, fore.g, fore.b);
		for (i, code) in text.bytes().take(COLUMNS).enumerate() {
			let char_rect = Rect::new(GLYPH_WIDTH as i32 * code as i32, 0, GLYPH_WIDTH, GLYPH_HEIGHT);
			let dest_rect = Rect::new(GLYPH_WIDTH as i32 * (column + i as i32), GLYPH_HEIGHT as i32 * row, GLYPH_WIDTH, GLYPH_HEIGHT);
			if let Err(e) = self.canvas.copy(font, Some(char_rect), Some(dest_rect)) {
				warn!("Render failed: {}", e);
				return;
			}
		}
	}

	fn draw_centred(&mut self, text: &str, row: i32, colour: (u8, u8, u8), brightness: u8) {
		let column = (COLUMNS as i32 - text.len().min(COLUMNS) as i32) / 2;
		self.draw_text(text, column, row, colour, brightness);
	}

	fn clear(&mut self) {
		self.canvas.set_draw_color(Color::RGB(0, 0, 0));
		self.canvas.clear();
	}

	fn present(&mut self) {
		self.canvas.present();
		// Only quit requests are handled while a program loads.
		for event in self.events.poll_iter() {
			if let Event::Quit { .. } = event {
				self.quit_requested = true;
			}
		}
		std::thread::sleep(FRAME);
	}

	/// Key presses since the last call, mapped through `pad`.
	fn poll_inputs(&mut self, pad: &KeyboardPad) -> Vec<Input> {
		let mut inputs = vec![];
		for event in self.events.poll_iter() {
			match event {
				Event::Quit { .. } => inputs.push(Input::Quit),
				Event::KeyDown { keycode: Some(keycode), .. } => inputs.extend(pad.map(keycode)),
				_ => {}
			}
		}
		inputs
	}
}

impl<'t> Presenter for SdlPresenter<'t> {
	fn draw_menu(&mut self, menu: &MenuState, brightness: u8) {
		self.clear();
		let catalog = menu.current_catalog();
		let selected = menu.selected_index();
		let first = selected.saturating_sub(LIST_ROWS / 2).min(catalog.len().saturating_sub(LIST_ROWS));
		self.draw_centred("Select a title", 1, (0xFF, 0xFF, 0x55), brightness);
		for (row, index) in (first..catalog.len()).take(LIST_ROWS).enumerate() {
			let name = match catalog.get(index) {
				Some(title) => title.name.to_string(),
				None => break,
			};
			let y = LIST_TOP + row as i32;
			if index == selected {
				self.canvas.set_draw_color(scaled((0x00, 0x00, 0xAA), brightness));
				self.canvas.fill_rect(Rect::new(0, GLYPH_HEIGHT as i32 * y, RENDER_WIDTH, GLYPH_HEIGHT)).ok();
				self.draw_text(&name, 2, y, (0xFF, 0xFF, 0xFF), brightness);
			} else {
				self.draw_text(&name, 2, y, (0xAA, 0xAA, 0xAA), brightness);
			}
		}
		self.present();
	}

	fn draw_banner(&mut self, banner: &Banner, brightness: u8) {
		self.clear();
		let heading = if banner.is_error { (0xFF, 0x55, 0x55) } else { (0x55, 0xFF, 0x55) };
		let middle = (RENDER_HEIGHT / GLYPH_HEIGHT) as i32 / 2;
		self.draw_centred(&banner.heading, middle - 1, heading, brightness);
		self.draw_centred(&banner.detail, middle + 1, (0xFF, 0xFF, 0xFF), brightness);
		self.present();
	}

	fn suspend(&mut self) -> ! {
		loop {
			self.canvas.present();
			for event in self.events.poll_iter() {
				if let Event::Quit { .. } = event {
					std::process::exit(1);
				}
			}
			std::thread::sleep(FRAME);
		}
	}

	fn as_subsystem(&mut self) -> &mut dyn Subsystem {
		self
	}
}

impl<'t> Subsystem for SdlPresenter<'t> {
	fn name(&self) -> &str {
		"graphics"
	}

	fn shutdown(&mut self) {
		self.clear();
		self.canvas.present();
		if self.quit_requested {
			info!("Quit was requested during loading");
		}
	}
}

/// Keyboard standing in for the controller.
pub struct KeyboardPad {
	enabled: bool,
}

impl KeyboardPad {
	pub fn new() -> KeyboardPad {
		KeyboardPad { enabled: true }
	}

	pub fn map(&self, keycode: Keycode) -> Option<Input> {
		if !self.enabled {
			return None;
		}
		match keycode {
			Keycode::Up => Some(Input::Up),
			Keycode::Down => Some(Input::Down),
			Keycode::PageUp | Keycode::Left => Some(Input::PageUp),
			Keycode::PageDown | Keycode::Right => Some(Input::PageDown),
			Keycode::Return | Keycode::Space => Some(Input::Confirm),
			Keycode::F5 => Some(Input::Reload),
			Keycode::Escape => Some(Input::Quit),
			_ => None,
		}
	}
}

impl Subsystem for KeyboardPad {
	fn name(&self) -> &str {
		"input"
	}

	fn shutdown(&mut self) {
		self.enabled = false;
	}
}

pub fn run(mut session: Session, config: &Config) -> Result<(), String> {
	let sdl_context = sdl2::init()?;
	let sdl_video = sdl_context.video()?;
	let _sdl_image = sdl2::image::init(INIT_PNG)?;
	let scale = config.window_scale.max(1);
	let window = sdl_video.window("discboot", RENDER_WIDTH * scale, RENDER_HEIGHT * scale)
		.position_centered()
		.build()
		.map_err(|e| e.to_string())?;
	let (window_width, window_height) = window.size();

	let mut canvas = window.into_canvas().software().build().map_err(|e| e.to_string())?;
	let texture_creator = canvas.texture_creator();
	canvas.set_scale(scale as f32, scale as f32)?;
	canvas.set_viewport(Rect::new(
		(window_width / scale) as i32 / 2 - RENDER_WIDTH as i32 / 2,
		(window_height / scale) as i32 / 2 - RENDER_HEIGHT as i32 / 2,
		RENDER_WIDTH,
		RENDER_HEIGHT,
	));

	let font = match session.font() {
		Some(png) => {
			let surface = RWops::from_bytes(png)?.load_png()?;
			Some(texture_creator.create_texture_from_surface(&surface).map_err(|e| e.to_string())?)
		}
		None => {
			warn!("No font in the graphics archive, text won't be drawn");
			None
		}
	};

	let mut presenter = SdlPresenter { canvas, font, events: sdl_context.event_pump()?, quit_requested: false };
	let mut pad = KeyboardPad::new();

	loop {
		for input in presenter.poll_inputs(&pad) {
			match session.handle(input) {
				Step::Continue => {}
				Step::Launch(request) => {
					let entry = HostEntry { memory_dump: config.memory_dump.clone() };
					session.launch(request, &mut presenter, &mut pad, entry)
				}
				Step::Quit => return Ok(()),
			}
		}
		presenter.draw_menu(&session.menu, 255);
	}
}
