//! Per mod status reporting.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
	Installing,
	Uninstalling,
	Completed,
	Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo {
	pub status: StatusType,
	pub name: String,
}

impl ProgressInfo {
	pub fn new(status: StatusType, name: impl Into<String>) -> Self {
		Self { status, name: name.into() }
	}
}

/// Receives status updates while a batch runs.
pub trait StatusProgress: Send + Sync {
	fn report(&self, info: ProgressInfo);
}

impl StatusProgress for tokio::sync::mpsc::UnboundedSender<ProgressInfo> {
	fn report(&self, info: ProgressInfo) {
		if self.send(info).is_err() {
			log::trace!("Progress receiver dropped.");
		}
	}
}
