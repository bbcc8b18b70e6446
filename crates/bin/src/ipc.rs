//! Unix socket transport between the host and surface processes.
//!
//! Each connection carries newline-delimited JSON envelopes in both
//! directions. A surface may open with an `attach` frame naming its kind
//! (`{"type":"attach","payload":{"kind":"primary"}}`); without one it is
//! attached as a secondary surface and its first frame is routed normally.

use std::path::Path;

use devpilot_host::{HostError, HostHandle, SurfaceLink};
use devpilot_proto::{Message, SurfaceId, SurfaceKind};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Transport-level frame selecting the surface kind.
const ATTACH: &str = "attach";

#[derive(Debug, Deserialize)]
struct AttachPayload {
	kind: SurfaceKind,
}

/// Serves surfaces on `socket_path` until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if a stale socket cannot be removed or the socket cannot
/// be bound.
pub async fn serve(socket_path: impl AsRef<Path>, host: HostHandle, shutdown: CancellationToken) -> std::io::Result<()> {
	let path = socket_path.as_ref();
	if path.exists() {
		tokio::fs::remove_file(path).await?;
	}

	let listener = UnixListener::bind(path)?;
	tracing::info!(path = %path.display(), "surface socket listening");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				tracing::info!("surface socket shutting down");
				break;
			}
			res = listener.accept() => match res {
				Ok((stream, _addr)) => {
					tokio::spawn(handle_connection(stream, host.clone()));
				}
				Err(e) => tracing::error!(error = %e, "failed to accept connection"),
			}
		}
	}

	if let Err(e) = tokio::fs::remove_file(path).await {
		tracing::debug!(error = %e, "socket file already gone");
	}
	Ok(())
}

/// Runs one surface connection to completion.
pub(crate) async fn handle_connection(stream: UnixStream, host: HostHandle) {
	let (reader, writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();

	let first = match next_message(&mut lines).await {
		Some(first) => first,
		None => {
			tracing::debug!("connection closed before first frame");
			return;
		}
	};
	let (kind, pending) = match attach_kind(&first) {
		Some(kind) => (kind, None),
		None => (SurfaceKind::Secondary, Some(first)),
	};

	let SurfaceLink {
		id,
		outbound,
		mut subscription,
	} = match host.attach(kind).await {
		Ok(link) => link,
		Err(HostError::Stopped) => {
			tracing::warn!("host stopped; refusing connection");
			return;
		}
	};
	tracing::info!(surface = %id, kind = %kind, "surface connected");

	let writer_task = tokio::spawn(write_messages(writer, outbound));

	forward_frames(&host, id, pending, &mut lines).await;

	subscription.cancel();
	if let Err(e) = writer_task.await {
		tracing::warn!(surface = %id, error = %e, "surface writer task failed");
	}
	tracing::info!(surface = %id, "surface disconnected");
}

/// Posts `pending`, then every frame read, until the peer closes or the host stops.
async fn forward_frames(
	host: &HostHandle,
	id: SurfaceId,
	mut pending: Option<Message>,
	lines: &mut tokio::io::Lines<BufReader<OwnedReadHalf>>,
) {
	loop {
		let message = match pending.take() {
			Some(message) => message,
			None => match next_message(lines).await {
				Some(message) => message,
				None => return,
			},
		};
		if host.post(id, message).await.is_err() {
			tracing::debug!(surface = %id, "host stopped; closing surface");
			return;
		}
	}
}

/// Reads the next well-formed envelope. Malformed lines are skipped.
async fn next_message(lines: &mut tokio::io::Lines<BufReader<OwnedReadHalf>>) -> Option<Message> {
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => return None,
			Err(e) => {
				tracing::debug!(error = %e, "surface read failed");
				return None;
			}
		};
		if line.trim().is_empty() {
			continue;
		}
		match serde_json::from_str::<Message>(&line) {
			Ok(message) => return Some(message),
			Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
		}
	}
}

fn attach_kind(message: &Message) -> Option<SurfaceKind> {
	if message.kind() != ATTACH {
		return None;
	}
	match serde_json::from_value::<AttachPayload>(message.payload().clone()) {
		Ok(payload) => Some(payload.kind),
		Err(e) => {
			tracing::warn!(error = %e, "attach frame without a valid kind; using secondary");
			Some(SurfaceKind::Secondary)
		}
	}
}

async fn write_messages(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Message>) {
	while let Some(message) = outbound.recv().await {
		let mut line = match serde_json::to_vec(&message) {
			Ok(line) => line,
			Err(e) => {
				tracing::warn!(kind = message.kind(), error = %e, "failed to encode message");
				continue;
			}
		};
		line.push(b'\n');
		if let Err(e) = writer.write_all(&line).await {
			tracing::debug!(error = %e, "surface write failed");
			break;
		}
	}
}

#[cfg(test)]
mod tests;
