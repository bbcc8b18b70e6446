use std::sync::Arc;
use std::time::Duration;

use devpilot_host::{Collaborators, Config, CredentialStore, HostService};
use devpilot_proto::{FeatureId, ThemeKind};
use devpilot_workspace::{ChatCompletions, FileCredentialStore, FsMarkerScanner, JsonFileStore, WorkspaceSource};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::Lines;

use super::*;
use crate::workbench::HeadlessWorkbench;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Env {
	dir: TempDir,
	host: HostHandle,
}

impl Env {
	fn start() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path().join("workspace");
		let state = dir.path().join("state");
		std::fs::create_dir_all(&root).unwrap();

		let config = Config::default();
		let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(state.join("credentials.json")));
		let collab = Collaborators {
			scanner: Arc::new(FsMarkerScanner::new(&root, &config.markers).unwrap()),
			editor: Arc::new(WorkspaceSource::new(&root)),
			generator: Arc::new(ChatCompletions::new(&config.generation, credentials.clone()).unwrap()),
			credentials,
			kv: Arc::new(JsonFileStore::new(state.join("state.json"))),
			workbench: Arc::new(HeadlessWorkbench::new(ThemeKind::Light)),
		};
		let host = HostService::start(config, collab);
		Self { dir, host }
	}

	fn connect(&self) -> Client {
		let (client, server) = UnixStream::pair().unwrap();
		tokio::spawn(handle_connection(server, self.host.clone()));
		let (reader, writer) = client.into_split();
		Client {
			lines: BufReader::new(reader).lines(),
			writer,
		}
	}
}

struct Client {
	lines: Lines<BufReader<OwnedReadHalf>>,
	writer: OwnedWriteHalf,
}

impl Client {
	async fn send(&mut self, frame: Value) {
		self.send_raw(&frame.to_string()).await;
	}

	async fn send_raw(&mut self, line: &str) {
		self.writer.write_all(line.as_bytes()).await.unwrap();
		self.writer.write_all(b"\n").await.unwrap();
	}

	/// Returns the payload of the next frame of `kind`, skipping others.
	async fn recv(&mut self, kind: &str) -> Value {
		tokio::time::timeout(TIMEOUT, async {
			loop {
				let line = self.lines.next_line().await.unwrap().expect("connection closed");
				let frame: Value = serde_json::from_str(&line).unwrap();
				if frame["type"] == kind {
					return frame["payload"].clone();
				}
			}
		})
		.await
		.unwrap_or_else(|_| panic!("no `{kind}` frame"))
	}
}

#[tokio::test]
async fn attach_frame_then_handshake() {
	let env = Env::start();
	let mut client = env.connect();
	client.send(json!({"type": "attach", "payload": {"kind": "primary"}})).await;
	client.send(json!({"type": "ready"})).await;

	assert_eq!(client.recv("theme").await, json!({"kind": 1}));
	assert_eq!(client.recv("switchFeature").await, json!({"feature": null}));
}

#[tokio::test]
async fn first_frame_without_attach_is_routed() {
	let env = Env::start();
	let mut client = env.connect();
	client.send_raw("this is not json").await;
	client.send(json!({"type": "ready", "payload": null})).await;

	assert_eq!(client.recv("theme").await, json!({"kind": 1}));
}

#[tokio::test]
async fn generation_failure_reaches_only_the_requester() {
	let env = Env::start();
	let mut asker = env.connect();
	asker.send(json!({"type": "ready"})).await;
	asker.recv("switchFeature").await;

	asker.send(json!({"type": "chatMessage", "payload": {"text": "hi"}})).await;
	let reply = asker.recv("chatReply").await;
	assert_eq!(reply["ok"], false);
	assert!(reply["error"].as_str().unwrap().contains("missing credential"));
}

#[tokio::test]
async fn feature_switch_is_broadcast_and_persisted() {
	let env = Env::start();
	let mut panel = env.connect();
	panel.send(json!({"type": "attach", "payload": {"kind": "primary"}})).await;
	panel.send(json!({"type": "ready"})).await;
	panel.recv("switchFeature").await;

	let mut sidebar = env.connect();
	sidebar.send(json!({"type": "ready"})).await;
	sidebar.recv("switchFeature").await;

	sidebar
		.send(json!({
			"type": "command",
			"payload": {"command": "devpilot.setActiveFeature", "args": ["chat"]},
		}))
		.await;

	assert_eq!(panel.recv("switchFeature").await, json!({"feature": "chat"}));
	assert_eq!(sidebar.recv("switchFeature").await, json!({"feature": "chat"}));
	let result = sidebar.recv("commandResult").await;
	assert_eq!(result["ok"], true);

	let state = env.host.state().await.unwrap();
	assert_eq!(state.active_feature, Some(FeatureId::new("chat")));
	let stored = std::fs::read_to_string(env.dir.path().join("state/state.json")).unwrap();
	assert!(stored.contains("\"chat\""));
}

#[tokio::test]
async fn closing_the_connection_detaches() {
	let env = Env::start();
	let (client, server) = UnixStream::pair().unwrap();
	let connection = tokio::spawn(handle_connection(server, env.host.clone()));
	let (reader, mut writer) = client.into_split();
	writer.write_all(b"{\"type\":\"ready\"}\n").await.unwrap();
	drop(writer);
	drop(reader);

	tokio::time::timeout(TIMEOUT, connection).await.unwrap().unwrap();
}

#[tokio::test]
async fn buffered_first_frame_stops_forwarding_when_host_is_gone() {
	let env = Env::start();
	let link = env.host.attach(SurfaceKind::Secondary).await.unwrap();
	env.host.shutdown().await.unwrap();
	assert!(env.host.state().await.is_err());

	let (client, server) = UnixStream::pair().unwrap();
	let (reader, _writer) = server.into_split();
	let mut lines = BufReader::new(reader).lines();
	let pending = Some(Message::new("ready", Value::Null));

	tokio::time::timeout(TIMEOUT, forward_frames(&env.host, link.id, pending, &mut lines))
		.await
		.expect("forwarding kept reading after the host stopped");
	drop(client);
}

#[tokio::test]
async fn serve_stops_on_shutdown_and_removes_socket() {
	let env = Env::start();
	let socket = env.dir.path().join("host.sock");
	let shutdown = CancellationToken::new();
	let server = tokio::spawn(serve(socket.clone(), env.host.clone(), shutdown.clone()));

	let stream = tokio::time::timeout(TIMEOUT, async {
		loop {
			if let Ok(stream) = UnixStream::connect(&socket).await {
				return stream;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap();
	drop(stream);

	shutdown.cancel();
	tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap().unwrap();
	assert!(!socket.exists());
}
