use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use cotizador::build_app;
use cotizador::config::environment::EnvironmentConfig;
use cotizador::services::event_hub::EventHub;
use cotizador::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(log_level(&config.log_level))
        .init();

    info!("🧾 Cotizador - API de cotizaciones");
    info!("================================================");
    info!("📁 Directorio de salida: {}", config.output_dir.display());
    let default_secrets = config.default_secrets();
    if !default_secrets.is_empty() {
        if config.is_production() {
            error!("❌ Secretos sin configurar en producción: {}", default_secrets.join(", "));
            return Err(anyhow::anyhow!("Secretos por defecto en producción"));
        }
        info!("⚠️ Usando secretos de desarrollo: {}", default_secrets.join(", "));
    }
    if !config.admin_auth_enabled() {
        info!("⚠️ ADMIN_PASSWORD no configurada: rutas de operador sin autenticación");
    }

    let addr: SocketAddr = config.server_url().parse()?;
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Error inicializando servicios: {}", e);
            return Err(anyhow::anyhow!("Error de inicialización: {}", e));
        }
    };
    let events = state.events.clone();
    let app = build_app(state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET    /api/quotes - Listar cotizaciones");
    info!("   GET    /api/quotes/next-reference - Próxima referencia");
    info!("   POST   /api/quotes - Crear cotización");
    info!("   GET    /api/quotes/:file - Obtener cotización");
    info!("   PUT    /api/quotes/:file - Actualizar cotización");
    info!("   DELETE /api/quotes/:file - Eliminar cotización");
    info!("   POST   /api/quotes/:file/approve - Aprobar / rechazar");
    info!("   POST   /api/quotes/:file/regenerate - Regenerar PDF");
    info!("   POST   /api/quotes/regenerate-all - Regenerar todos los PDFs");
    info!("   GET    /api/events - Eventos SSE");
    info!("   POST   /api/admin/login - Login de administrador");
    info!("   GET    /outputs/* - Artefactos PDF y QR");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(events))
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

fn log_level(level: &str) -> tracing::Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Señal de apagado graceful; cierra los streams SSE abiertos
async fn shutdown_signal(events: EventHub) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }

    events.clear();
}
