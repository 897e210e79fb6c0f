use anyhow::Result;
use pupd::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(name = version::NAME, version = version::VERSION, "starting");

    let store = store::PupStore::open(&app_config.storage.pups_dir)?;
    let sources: Arc<dyn sources::SourceManager> =
        Arc::new(sources::DiskSourceManager::new(app_config.sources.clone()));

    let (senders, streams) = monitor::channel(app_config.publishing.subscriber_capacity);
    let docker_monitor = Arc::new(monitor::DockerMonitor::connect(
        monitor::DockerMonitorConfig {
            slow_interval_ms: app_config.monitoring.slow_interval_ms,
            fast_interval_ms: app_config.monitoring.fast_interval_ms,
            fast_poll_count: app_config.monitoring.fast_poll_count,
            data_dir: app_config.storage.data_dir.clone(),
        },
        senders,
    )?);

    let manager = pup_manager::PupManager::load(
        pup_manager::ManagerDeps {
            store,
            sources,
            monitor: Some(docker_monitor.clone()),
        },
        pup_manager::ManagerConfig {
            allocation: app_config.allocation.clone(),
            metric_buffer_size: app_config.monitoring.metric_buffer_size,
            subscriber_capacity: app_config.publishing.subscriber_capacity,
        },
    )
    .await?;

    let patcher = patch::Patcher::new(
        &app_config.storage.config_dir,
        &app_config.storage.snapshot_dir,
        Arc::new(patch::CommandRebuilder::new(&app_config.rebuild.command)?),
        Arc::new(action_log::TracingActionLogger),
    )?;

    let (monitor_shutdown_tx, monitor_shutdown_rx) = tokio::sync::oneshot::channel();
    let (loop_shutdown_tx, loop_shutdown_rx) = tokio::sync::oneshot::channel();
    let monitor_handle = docker_monitor.spawn(monitor_shutdown_rx);
    let loop_handle = manager.spawn_monitor_loop(
        streams,
        pup_manager::MonitorLoopConfig {
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
        loop_shutdown_rx,
    );

    let app = routes::app(manager, Some(patcher));
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let _ = monitor_shutdown_tx.send(());
            let _ = loop_shutdown_tx.send(());
            let _ = monitor_handle.await;
            let _ = loop_handle.await;
        }
    }

    Ok(())
}
