use crate::core::audio::SharedAudio;
use crate::core::command::{responses, CommandInterpreter, Intent, ESCAPE_SEQUENCE};
use crate::core::phonebook::{DialPlan, PhonebookResolver};
use crate::core::session::state::{ModemMode, SessionState, SessionStatistics};
use crate::domain::config::{cues, ModemConfig};
use crate::domain::error::ModemResult;
use crate::infrastructure::tcp::bridge::{BridgeEvent, UpstreamBridge};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;
const ERASE_SEQUENCE: &[u8] = b"\x08 \x08";

/// One emulated modem attached to one client connection.
///
/// The session owns its state outright: client input and bridge events are
/// both consumed by the single loop in [`ModemSession::run`], so mode and
/// flags never change underneath a running command.
pub struct ModemSession<S> {
    id: String,
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    state: SessionState,
    statistics: SessionStatistics,
    interpreter: CommandInterpreter,
    phonebook: PhonebookResolver,
    config: Arc<ModemConfig>,
    audio: SharedAudio,
    bridge: Option<UpstreamBridge>,
    cancel: CancellationToken,
}

impl<S> ModemSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
{
    /// Create a session over a freshly accepted client stream.
    ///
    /// `cancel` is the session's own shutdown signal; firing it ends
    /// [`run`](Self::run), stops audio and closes both sockets.
    pub fn new(
        stream: S,
        config: Arc<ModemConfig>,
        audio: SharedAudio,
        cancel: CancellationToken,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reader,
            writer,
            state: SessionState::new(),
            statistics: SessionStatistics::default(),
            interpreter: CommandInterpreter::new(config.modem.banner.clone()),
            phonebook: PhonebookResolver::new(config.phonebook.clone()),
            config,
            audio,
            bridge: None,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> ModemMode {
        self.state.mode()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn statistics(&self) -> &SessionStatistics {
        &self.statistics
    }

    pub fn has_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /// Serve the client until it disconnects or the session is cancelled
    pub async fn run(&mut self) -> ModemResult<()> {
        info!("Modem session {} started", self.id);

        let result = self.serve().await;
        self.teardown().await;

        info!(
            "Modem session {} ended: {} commands, {} dials, {} connections, {} bytes up, {} bytes down",
            self.id,
            self.statistics.commands,
            self.statistics.dial_attempts,
            self.statistics.connections,
            self.statistics.bytes_upstream,
            self.statistics.bytes_downstream
        );

        result
    }

    /// Release everything the session holds. Safe to call more than once.
    pub async fn teardown(&mut self) {
        self.cancel.cancel();
        self.drop_bridge().await;
        self.audio.stop();

        if let Err(e) = self.writer.shutdown().await {
            debug!("Failed to shutdown client stream: {}", e);
        }
    }

    async fn serve(&mut self) -> ModemResult<()> {
        let greeting = format!("{}\r\n", self.interpreter.banner());
        self.write_str(&greeting).await?;
        self.write_str(responses::READY).await?;

        let mut buffer = vec![0u8; 4096];

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Modem session {} cancelled", self.id);
                    return Ok(());
                }
                result = self.reader.read(&mut buffer) => {
                    let n = result?;
                    if n == 0 {
                        info!("Client closed modem session {}", self.id);
                        return Ok(());
                    }
                    self.ingest(&buffer[..n]).await?;
                }
                // Outside online mode upstream data waits in the socket
                event = next_bridge_event(&mut self.bridge), if self.state.is_online() => {
                    self.on_bridge_event(event).await?;
                }
            }
        }
    }

    /// Handle one chunk read from the client
    async fn ingest(&mut self, chunk: &[u8]) -> ModemResult<()> {
        if self.state.is_online() {
            self.ingest_online(chunk).await
        } else {
            self.ingest_command(chunk).await
        }
    }

    async fn ingest_online(&mut self, chunk: &[u8]) -> ModemResult<()> {
        if chunk == ESCAPE_SEQUENCE.as_bytes() {
            self.state.set_mode(ModemMode::Command);
            self.write_str(responses::OK).await?;
            debug!("Returned to command mode");
            return Ok(());
        }

        match &self.bridge {
            Some(bridge) => {
                self.statistics.bytes_upstream += chunk.len() as u64;
                bridge.send(chunk).await;
            }
            None => {
                warn!("Online without an upstream connection, dropping to command mode");
                self.state.set_mode(ModemMode::Command);
            }
        }
        Ok(())
    }

    async fn ingest_command(&mut self, chunk: &[u8]) -> ModemResult<()> {
        for (index, &byte) in chunk.iter().enumerate() {
            match byte {
                b'\r' | b'\n' => {
                    let Some(line) = self.state.take_line() else {
                        continue;
                    };

                    if self.state.echo_enabled() {
                        self.write_str("\r\n").await?;
                    }
                    self.handle_line(&line).await?;

                    if self.state.is_online() {
                        // The rest of the chunk belongs to the new connection
                        let rest = &chunk[index + 1..];
                        let rest = rest.strip_prefix(b"\n").unwrap_or(rest);
                        if !rest.is_empty() {
                            self.ingest_online(rest).await?;
                        }
                        return Ok(());
                    }
                }
                BACKSPACE | DELETE => {
                    if self.state.backspace() && self.state.echo_enabled() {
                        self.write_bytes(ERASE_SEQUENCE).await?;
                    }
                }
                32..=126 => {
                    if self.state.push_char(byte as char) && self.state.echo_enabled() {
                        self.write_bytes(&[byte]).await?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> ModemResult<()> {
        debug!("Command: {}", line);
        self.statistics.commands += 1;

        let parsed = self.interpreter.parse(line);
        if !parsed.response.is_empty() {
            self.write_str(&parsed.response).await?;
        }

        if let Some(intent) = parsed.intent {
            self.execute(intent).await?;
        }
        Ok(())
    }

    async fn execute(&mut self, intent: Intent) -> ModemResult<()> {
        match intent {
            Intent::Reset => {
                info!("Modem reset");
                self.drop_bridge().await;
                self.state.set_mode(ModemMode::Command);
            }
            Intent::Hangup => {
                info!("Hanging up");
                self.drop_bridge().await;
                self.state.set_mode(ModemMode::Command);
            }
            Intent::SetEcho(enabled) => self.state.set_echo(enabled),
            Intent::SetVerbose(enabled) => self.state.set_verbose(enabled),
            Intent::Escape => {
                if self.state.is_online() {
                    self.state.set_mode(ModemMode::Command);
                }
            }
            Intent::GoOnline => {
                // A bridge whose remote already left still has data and a close to deliver
                if self.bridge.is_some() {
                    self.state.set_mode(ModemMode::Connected);
                } else {
                    debug!("ATO without a connection ignored");
                }
            }
            Intent::Dial(number) => self.dial(&number).await?,
            Intent::Unknown => {}
        }
        Ok(())
    }

    async fn dial(&mut self, number: &str) -> ModemResult<()> {
        info!("Dialing: {}", number);
        self.statistics.dial_attempts += 1;

        // One upstream connection at a time
        self.drop_bridge().await;
        self.state.set_mode(ModemMode::Dialing);

        self.play_cue(cues::DIALTONE).await;
        self.play_dial_tones(number).await;

        let plan = self.phonebook.plan(number);
        if plan == DialPlan::NotFound {
            warn!("Number not found in phonebook: {}", number);
            self.play_cue(cues::CONNECT_FAILED).await;
            self.write_str(responses::NO_CARRIER).await?;
            self.state.set_mode(ModemMode::Command);
            return Ok(());
        }

        if let Some(announce) = plan.announce() {
            debug!("Playing announce cue: {}", announce);
            self.play_cue(announce).await;
        }

        let (host, port) = match plan {
            DialPlan::Connect { host, port, .. } => (host, port),
            DialPlan::InvalidRoute { route, reason, .. } => {
                warn!("Invalid route '{}' for {}: {}", route, number, reason);
                self.write_str(responses::NO_CARRIER).await?;
                self.state.set_mode(ModemMode::Command);
                return Ok(());
            }
            DialPlan::Busy { .. } | DialPlan::NotFound => {
                self.state.set_mode(ModemMode::Busy);
                self.play_cue(cues::BUSY).await;
                self.write_str(responses::BUSY).await?;
                self.state.set_mode(ModemMode::Command);
                return Ok(());
            }
        };

        let mut bridge = UpstreamBridge::new(self.cancel.child_token());
        let deadline = self.config.modem.connect_timeout();
        let connected = tokio::select! {
            connected = bridge.connect(&host, port, deadline) => connected,
            _ = self.cancel.cancelled() => false,
        };

        if connected {
            self.play_cue(cues::MODEM_NOISE).await;
            self.play_cue(cues::CONNECT_SUCCESS).await;

            // Anything the remote did during the cues is delivered after CONNECT
            self.bridge = Some(bridge);
            self.statistics.connections += 1;
            self.state.set_mode(ModemMode::Connected);
            self.write_str(responses::CONNECT).await?;
            info!("Connected to {}:{}", host, port);
        } else {
            bridge.disconnect().await;
            self.play_cue(cues::CONNECT_FAILED).await;
            self.state.set_mode(ModemMode::Command);
            self.write_str(responses::NO_CARRIER).await?;
            warn!("Connection to {}:{} failed", host, port);
        }
        Ok(())
    }

    async fn play_dial_tones(&self, number: &str) {
        let timing = &self.config.dial;

        for c in number.chars() {
            if self.cancel.is_cancelled() {
                return;
            }

            if let Some(cue) = cues::tone(c) {
                self.play_cue(&cue).await;
                self.pause(timing.tone_gap_ms).await;
            } else if c == ' ' || c == '-' {
                self.pause(timing.separator_gap_ms).await;
            }
        }

        self.pause(timing.closing_gap_ms).await;
    }

    async fn play_cue(&self, cue: &str) {
        let played = tokio::select! {
            played = self.audio.play(cue) => played,
            _ = self.cancel.cancelled() => {
                self.audio.stop();
                false
            }
        };

        if !played {
            debug!("Sound cue '{}' skipped", cue);
        }
    }

    async fn pause(&self, millis: u64) {
        if millis == 0 {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn on_bridge_event(&mut self, event: BridgeEvent) -> ModemResult<()> {
        match event {
            BridgeEvent::Data(data) => {
                if self.state.is_online() {
                    self.statistics.bytes_downstream += data.len() as u64;
                    self.write_bytes(&data).await?;
                } else {
                    debug!("Dropping {} upstream bytes outside online mode", data.len());
                }
            }
            BridgeEvent::Closed => {
                if self.state.is_online() {
                    info!("Remote connection closed");
                    self.state.set_mode(ModemMode::Command);
                    self.bridge = None;
                    self.write_str(responses::NO_CARRIER).await?;
                } else {
                    debug!("Upstream closed while in {} mode", self.state.mode());
                }
            }
        }
        Ok(())
    }

    async fn drop_bridge(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.disconnect().await;
        }
    }

    async fn write_str(&mut self, text: &str) -> ModemResult<()> {
        self.write_bytes(text.as_bytes()).await
    }

    async fn write_bytes(&mut self, data: &[u8]) -> ModemResult<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

async fn next_bridge_event(bridge: &mut Option<UpstreamBridge>) -> BridgeEvent {
    match bridge {
        Some(bridge) => bridge.recv().await,
        None => std::future::pending().await,
    }
}
