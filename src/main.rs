use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use services::focus_tracker::FocusState;
use services::widget_backend::LoggingWidgetBackend;
use services::{
    build_bindings, create_compositor_source, create_widget_backend, event_channel, send_request,
    CommandRouter, ComponentFactory, ControlRequest, ControlServer, EventLoop, FocusTracker,
    MonitorManager, MonitorRegistry, ShellEvent,
};
use utils::DesktopNotifier;

#[derive(Parser, Debug)]
#[command(name = "rz-shell")]
#[command(about = "Координатор виджетов оболочки для нескольких мониторов")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "rz-shell.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция композитора и виджетов)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию - из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Запустить оболочку (по умолчанию)
    Run,
    /// Отправить действие запущенной оболочке, например `toggle-launcher`
    Dispatch { action: String },
    /// Показать мониторы и компоненты запущенной оболочки
    Status,
    /// Показать таблицу привязок действий
    Actions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    let default_command = Command::Run;
    let command = args.command.as_ref().unwrap_or(&default_command);
    let level = match (command, &args.log_level) {
        (_, Some(level)) => level.clone(),
        (Command::Run, None) => config.logging.level.clone(),
        // Клиентские команды не должны шуметь в stdout
        (_, None) => "warn".to_string(),
    };

    // Инициализация системы логирования
    init_tracing(&level, &config.logging.format)?;

    match command {
        Command::Run => run_shell(config, &args).await,
        Command::Dispatch { action } => {
            let output = send_request(&config.socket_path(), &ControlRequest::Dispatch(action.clone())).await?;
            println!("{}", output);
            Ok(())
        }
        Command::Status => {
            let output = send_request(&config.socket_path(), &ControlRequest::Status).await?;
            println!("{}", output);
            Ok(())
        }
        Command::Actions => {
            let backend = Arc::new(LoggingWidgetBackend::new());
            let mut bindings = build_bindings(backend, &config.keybinds)?;
            bindings.sort_by(|a, b| a.action.cmp(&b.action));
            for binding in bindings {
                println!("{:<24} {:<14} {}", binding.action, binding.target_kind.as_str(), binding.handler.describe());
            }
            Ok(())
        }
    }
}

async fn run_shell(config: Config, args: &Args) -> Result<()> {
    info!("Запуск Rz-Shell v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - композитор и виджеты эмулируются");
    }

    let config = Arc::new(config);

    // Инициализация компонентов: единственный экземпляр каждого сервиса живёт здесь
    let backend = create_widget_backend(config.clone(), args.dry_run)?;
    let registry = Arc::new(MonitorRegistry::new());
    let factory = Arc::new(ComponentFactory::new(backend.clone()).with_layout(config.widget_layout()));
    let manager = Arc::new(MonitorManager::new(
        registry.clone(),
        factory,
        config.enabled_kinds().to_vec(),
    ));
    let focus = Arc::new(FocusTracker::new(registry, config.focus.fallback));
    let router = Arc::new(CommandRouter::new(
        build_bindings(backend, &config.keybinds)?,
        focus.clone(),
        manager.clone(),
    ));
    let notifier = Arc::new(DesktopNotifier::new(config.notifications.enabled, args.dry_run));

    let (events_tx, events_rx) = event_channel();
    let event_loop = EventLoop::new(config.clone(), manager.clone(), focus.clone(), events_rx);
    let compositor = create_compositor_source(config.clone(), events_tx.clone(), args.dry_run)?;
    let socket_path = config.socket_path();
    let control = ControlServer::new(
        socket_path.clone(),
        router,
        manager,
        focus.clone(),
        events_tx.clone(),
        notifier,
    );

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let loop_handle = tokio::spawn(event_loop.run());
    let compositor_handle = tokio::spawn(async move {
        if let Err(e) = compositor.run().await {
            error!("Ошибка в источнике событий композитора: {}", e);
        }
    });
    let control_handle = tokio::spawn(async move {
        if let Err(e) = control.run().await {
            error!("Ошибка в управляющем сокете: {}", e);
        }
    });
    let reload_handle = {
        let config_path = args.config.clone();
        let events = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = reload_on_sighup(config_path, events).await {
                error!("Ошибка в обработчике SIGHUP: {}", e);
            }
        })
    };
    let focus_handle = tokio::spawn(log_focus_changes(focus.subscribe()));

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Новые события больше не принимаем
    compositor_handle.abort();
    control_handle.abort();
    reload_handle.abort();
    focus_handle.abort();

    if events_tx.send(ShellEvent::Shutdown).await.is_err() {
        warn!("EventLoop уже остановлен");
    }

    // Ожидаем разбора всех компонентов (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    match tokio::time::timeout(shutdown_timeout, loop_handle).await {
        Ok(Ok(Ok(()))) => info!("Все компоненты разобраны корректно"),
        Ok(Ok(Err(e))) => error!("EventLoop завершился с ошибкой: {}", e),
        Ok(Err(e)) => error!("EventLoop завершился аварийно: {}", e),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!("Сокет {:?} не удалён: {}", socket_path, e);
    }

    info!("Rz-Shell завершил работу");
    Ok(())
}

/// По SIGHUP перечитываем список включённых компонентов
async fn reload_on_sighup(config_path: String, events: mpsc::Sender<ShellEvent>) -> Result<()> {
    let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;

    while hangup.recv().await.is_some() {
        info!("Получен SIGHUP - перечитываем конфигурацию");
        match Config::load(&config_path) {
            Ok(config) => {
                events
                    .send(ShellEvent::Reload(config.enabled_kinds().to_vec()))
                    .await?;
            }
            Err(e) => warn!("Конфигурация не перезагружена: {:#}", e),
        }
    }
    Ok(())
}

async fn log_focus_changes(mut focus: watch::Receiver<FocusState>) {
    while focus.changed().await.is_ok() {
        let state = focus.borrow_and_update().clone();
        debug!("Состояние фокуса: {:?}", state);
    }
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    let compact = (format == "compact").then(|| tracing_subscriber::fmt::layer().compact());
    let full = (format != "compact").then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(full)
        .init();

    Ok(())
}
