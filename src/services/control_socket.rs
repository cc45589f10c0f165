use crate::error::{Result, ShellError};
use crate::events::{ComponentKind, Geometry, MonitorId};
use crate::services::command_router::CommandRouter;
use crate::services::event_loop::ShellEvent;
use crate::services::focus_tracker::FocusTracker;
use crate::services::monitor_manager::MonitorManager;
use crate::shell_error;
use crate::utils::DesktopNotifier;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Запрос по управляющему сокету (одна строка)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Dispatch(String),
    Status,
    Actions,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("dispatch"), Some(action), None) => Some(Self::Dispatch(action.to_string())),
            (Some("status"), None, None) => Some(Self::Status),
            (Some("actions"), None, None) => Some(Self::Actions),
            _ => None,
        }
    }

    pub fn to_line(&self) -> String {
        match self {
            Self::Dispatch(action) => format!("dispatch {}", action),
            Self::Status => "status".to_string(),
            Self::Actions => "actions".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MonitorStatus {
    id: MonitorId,
    geometry: Geometry,
    attached: bool,
    components: Vec<ComponentKind>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    focused: Option<MonitorId>,
    enabled: Vec<ComponentKind>,
    monitors: Vec<MonitorStatus>,
}

#[derive(Debug, Serialize)]
struct ActionEntry {
    action: String,
    kind: ComponentKind,
    command: String,
}

/// Сервер управляющего сокета: сюда приходят действия от глобальных привязок клавиш
pub struct ControlServer {
    path: PathBuf,
    router: Arc<CommandRouter>,
    manager: Arc<MonitorManager>,
    focus: Arc<FocusTracker>,
    events: mpsc::Sender<ShellEvent>,
    notifier: Arc<DesktopNotifier>,
}

impl ControlServer {
    pub fn new(
        path: PathBuf,
        router: Arc<CommandRouter>,
        manager: Arc<MonitorManager>,
        focus: Arc<FocusTracker>,
        events: mpsc::Sender<ShellEvent>,
        notifier: Arc<DesktopNotifier>,
    ) -> Self {
        Self {
            path,
            router,
            manager,
            focus,
            events,
            notifier,
        }
    }

    pub async fn run(self) -> Result<()> {
        if self.path.exists() {
            debug!("Удаляем старый сокет {:?}", self.path);
            std::fs::remove_file(&self.path)?;
        }

        let listener = UnixListener::bind(&self.path)?;
        info!("Управляющий сокет слушает {:?}", self.path);

        let server = Arc::new(self);
        loop {
            let (stream, _) = listener.accept().await?;
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                if let Err(e) = server.handle_client(stream).await {
                    warn!("Ошибка клиента управляющего сокета: {}", e);
                }
            });
        }
    }

    async fn handle_client(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            let response = self.handle_line(line.trim()).await;
            writer.write_all(response.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        Ok(())
    }

    async fn handle_line(&self, line: &str) -> String {
        let Some(request) = ControlRequest::parse(line) else {
            return encode_reply("err bad_request", line);
        };

        let result = match request {
            ControlRequest::Dispatch(action) => self.dispatch(&action).await,
            ControlRequest::Status => self.status().await,
            ControlRequest::Actions => self.actions(),
        };

        match result {
            Ok(payload) => encode_reply("ok", &payload),
            Err(e) => encode_reply(&format!("err {}", e.code()), &e.to_string()),
        }
    }

    async fn dispatch(&self, action: &str) -> Result<String> {
        match self.router.dispatch(action).await {
            Ok(outcome) => Ok(outcome.output),
            Err(e) => {
                // Ошибка маршрутизации видна пользователю, но процесс продолжает работу
                if e.is_transient() {
                    warn!("Действие {} не выполнено: {}", action, e);
                } else {
                    error!("Действие {} завершилось ошибкой: {}", action, e);
                }
                self.notifier.notify("Действие не выполнено", &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn status(&self) -> Result<String> {
        let (done, wait) = oneshot::channel();
        self.events
            .send(ShellEvent::Settle(done))
            .await
            .map_err(|_| shell_error!(channel, "EventLoop не запущен"))?;
        if timeout(SETTLE_TIMEOUT, wait).await.is_err() {
            warn!("Очереди мониторов не разошлись за {:?}, отдаём текущее состояние", SETTLE_TIMEOUT);
        }

        let monitors = self
            .manager
            .registry()
            .snapshot()
            .into_iter()
            .map(|monitor| MonitorStatus {
                components: self
                    .manager
                    .instances_of(&monitor.id)
                    .iter()
                    .filter(|inst| inst.is_live())
                    .map(|inst| inst.kind)
                    .collect(),
                attached: monitor.is_attached(),
                geometry: monitor.geometry,
                id: monitor.id,
            })
            .collect();

        let report = StatusReport {
            focused: self.focus.current(),
            enabled: self.manager.enabled_kinds(),
            monitors,
        };
        Ok(serde_json::to_string(&report)?)
    }

    fn actions(&self) -> Result<String> {
        let entries: Vec<ActionEntry> = self
            .router
            .bindings()
            .into_iter()
            .map(|binding| ActionEntry {
                action: binding.action.clone(),
                kind: binding.target_kind,
                command: binding.handler.describe(),
            })
            .collect();
        Ok(serde_json::to_string(&entries)?)
    }
}

/// Отправить один запрос запущенной оболочке и вернуть полезную нагрузку ответа
pub async fn send_request(path: &Path, request: &ControlRequest) -> Result<String> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| shell_error!(channel, "оболочка не запущена ({:?}): {}", path, e))?;
    let (reader, mut writer) = stream.into_split();

    writer.write_all(request.to_line().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.shutdown().await?;

    let response = BufReader::new(reader)
        .lines()
        .next_line()
        .await?
        .ok_or_else(|| shell_error!(channel, "оболочка закрыла соединение без ответа"))?;

    parse_response(&response)
}

/// Ответ занимает ровно одну строку: полезная нагрузка идёт JSON-строкой,
/// так что переводы строк в выводе виджета экранируются.
///
/// - `ok <json-string>`
/// - `err <code> <json-string>`
fn encode_reply(head: &str, payload: &str) -> String {
    format!("{} {}", head, serde_json::Value::String(payload.to_string()))
}

fn parse_response(response: &str) -> Result<String> {
    if let Some(payload) = response.strip_prefix("ok ") {
        return Ok(serde_json::from_str(payload)?);
    }
    if let Some(error) = response.strip_prefix("err ") {
        let (code, message) = error
            .split_once(' ')
            .ok_or_else(|| shell_error!(internal, "непонятный ответ: {}", response))?;
        return Err(ShellError::Remote {
            code: code.to_string(),
            message: serde_json::from_str(message)?,
        });
    }
    Err(shell_error!(internal, "непонятный ответ: {}", response))
}
