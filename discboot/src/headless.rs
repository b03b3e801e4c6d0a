//! Terminal front-end. The menu is printed to stdout and inputs come from the configured script.

use crate::config::Config;
use crate::session::{Banner, Input, Presenter, Session, Step};
use crate::subsystems::HostEntry;

use libdiscboot::handoff::Subsystem;
use libdiscboot::menu::MenuState;

use log::{debug, warn};
use std::time::Duration;

pub struct HeadlessPresenter {
	last_banner: Option<Banner>,
}

impl HeadlessPresenter {
	pub fn new() -> HeadlessPresenter {
		HeadlessPresenter { last_banner: None }
	}
}

pub fn print_menu(menu: &MenuState) {
	for (i, title) in menu.current_catalog().records().iter().enumerate() {
		let marker = if i == menu.selected_index() { '>' } else { ' ' };
		println!("{} {:3} {}", marker, i, title.name);
	}
}

impl Presenter for HeadlessPresenter {
	fn draw_menu(&mut self, _menu: &MenuState, _brightness: u8) {}

	fn draw_banner(&mut self, banner: &Banner, _brightness: u8) {
		// Printed once, when the banner first appears.
		if self.last_banner.as_ref() != Some(banner) {
			println!("{}", banner.heading);
			println!("{}", banner.detail);
			self.last_banner = Some(banner.clone());
		}
	}

	fn suspend(&mut self) -> ! {
		loop {
			std::thread::sleep(Duration::from_secs(1));
		}
	}

	fn as_subsystem(&mut self) -> &mut dyn Subsystem {
		self
	}
}

impl Subsystem for HeadlessPresenter {
	fn name(&self) -> &str {
		"graphics"
	}

	fn shutdown(&mut self) {
		self.last_banner = None;
	}
}

/// The remaining scripted inputs.
pub struct ScriptInput {
	inputs: std::vec::IntoIter<Input>,
}

impl ScriptInput {
	pub fn from_config(config: &Config) -> ScriptInput {
		let inputs: Vec<Input> = config.script.iter()
			.filter_map(|line| match line.parse() {
				Ok(input) => Some(input),
				Err(e) => {
					warn!("Skipping script line: {}", e);
					None
				}
			})
			.collect();
		ScriptInput { inputs: inputs.into_iter() }
	}
}

impl Iterator for ScriptInput {
	type Item = Input;

	fn next(&mut self) -> Option<Input> {
		self.inputs.next()
	}
}

impl Subsystem for ScriptInput {
	fn name(&self) -> &str {
		"input"
	}

	fn shutdown(&mut self) {
		let left = self.inputs.len();
		if left > 0 {
			debug!("Dropping {} scripted inputs", left);
		}
		self.inputs = Vec::new().into_iter();
	}
}

/// Plays the script against the menu. Returns when the script runs out or asks to quit, or not at
/// all if a program gets started.
pub fn run(mut session: Session, config: &Config) {
	let mut presenter = HeadlessPresenter::new();
	let mut input = ScriptInput::from_config(config);
	print_menu(&session.menu);
	while let Some(next) = input.next() {
		debug!("Input {:?}", next);
		match session.handle(next) {
			Step::Continue => {
				if next == Input::Reload || next == Input::Confirm {
					print_menu(&session.menu);
				}
			}
			Step::Launch(request) => {
				let entry = HostEntry { memory_dump: config.memory_dump.clone() };
				session.launch(request, &mut presenter, &mut input, entry)
			}
			Step::Quit => return,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test] fn test_script_skips_unknown_lines() {
		let config = Config { script: vec!["down".to_string(), "fly".to_string(), "confirm".to_string()], ..Config::default() };
		let mut input = ScriptInput::from_config(&config);
		assert_eq!(input.next(), Some(Input::Down));
		input.shutdown();
		assert_eq!(input.next(), None);
	}

	#[test] fn test_banner_prints_once() {
		let mut presenter = HeadlessPresenter::new();
		let banner = Banner::now_playing("Game A");
		presenter.draw_banner(&banner, 10);
		presenter.draw_banner(&banner, 20);
		assert_eq!(presenter.last_banner, Some(banner));
		presenter.as_subsystem().shutdown();
		assert_eq!(presenter.last_banner, None);
	}
}
