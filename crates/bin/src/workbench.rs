use devpilot_host::Workbench;
use devpilot_proto::{SurfaceKind, ThemeKind};

/// Workbench for a host without its own window system.
///
/// Surfaces are separate processes that connect on their own, so a reveal
/// request can only be logged for whoever launches them.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessWorkbench {
	theme: ThemeKind,
}

impl HeadlessWorkbench {
	pub fn new(theme: ThemeKind) -> Self {
		Self { theme }
	}
}

impl Workbench for HeadlessWorkbench {
	fn reveal(&self, kind: SurfaceKind) {
		tracing::info!(kind = %kind, "surface reveal requested");
	}

	fn current_theme(&self) -> ThemeKind {
		self.theme
	}
}
