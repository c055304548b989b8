use crate::config::GambitConfig;
use crate::enforcer::{EnforcerConfig, TimeoutEnforcer};
use crate::events::EventBus;
use crate::handlers;
use crate::middleware::with_request_logging;
use crate::services::{
    CombatService, RoundAction, SeatRequest, StartEncounter, StartHandRequest, TableActionRequest,
    TableService,
};
use crate::store::{SqliteStore, StoreError};
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::Reply;
use warp::Filter;

/// Largest JSON body accepted by the API.
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Shared components behind every route, cheap to clone.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: GambitConfig,
    bus: EventBus,
    store: Arc<SqliteStore>,
    combat: Arc<CombatService>,
    tables: Arc<TableService>,
    enforcer: Arc<TimeoutEnforcer>,
}

impl AppContext {
    /// Opens the configured database and wires the services to it.
    pub fn new(config: GambitConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|err| ServerError::ConfigError(err.to_string()))?;
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: GambitConfig, store: Arc<SqliteStore>) -> Self {
        let bus = EventBus::new();
        let combat = Arc::new(CombatService::new(
            Arc::clone(&store),
            bus.clone(),
            config.round_config(),
            config.opponent.clone(),
        ));
        let tables = Arc::new(TableService::new(Arc::clone(&store), bus.clone()));
        let enforcer = Arc::new(TimeoutEnforcer::new(
            Arc::clone(&combat),
            EnforcerConfig::from(&config),
        ));

        Self {
            config,
            bus,
            store,
            combat,
            tables,
            enforcer,
        }
    }

    /// In-memory store on an ephemeral port.
    pub fn for_tests() -> Result<Self, ServerError> {
        let config = GambitConfig {
            port: 0,
            ..GambitConfig::default()
        };
        let store = Arc::new(SqliteStore::open_in_memory()?);
        Ok(Self::with_store(config, store))
    }

    pub fn config(&self) -> &GambitConfig {
        &self.config
    }

    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    pub fn combat(&self) -> Arc<CombatService> {
        Arc::clone(&self.combat)
    }

    pub fn tables(&self) -> Arc<TableService> {
        Arc::clone(&self.tables)
    }

    pub fn enforcer(&self) -> Arc<TimeoutEnforcer> {
        Arc::clone(&self.enforcer)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: GambitConfig) -> Result<Self, ServerError> {
        let context = AppContext::new(config)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.config())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(%addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &GambitConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host.as_str();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port));
        }

        let candidate = format!("{}:{}", host, config.port);
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route of the API, for serving or for `warp::test`.
    pub fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let routes = Self::health_route(context)
            .or(Self::encounter_routes(context))
            .unify()
            .or(Self::table_routes(context))
            .unify()
            .or(Self::sse_routes(context))
            .unify()
            .boxed();
        with_request_logging(routes)
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let enforcer = context.enforcer();
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(move || handlers::health(Arc::clone(&enforcer)).into_response())
            .boxed()
    }

    fn encounter_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let combat = context.combat();

        let start = warp::path!("api" / "encounters")
            .and(warp::post())
            .and(Self::with_combat(combat.clone()))
            .and(Self::json_body::<StartEncounter>())
            .and_then(
                |combat: Arc<CombatService>, request: StartEncounter| async move {
                    Ok::<_, Infallible>(handlers::start_encounter(combat, request).await)
                },
            );

        let info = warp::path!("api" / "encounters" / String)
            .and(warp::get())
            .and(Self::with_combat(combat.clone()))
            .and_then(|encounter_id: String, combat: Arc<CombatService>| async move {
                Ok::<_, Infallible>(handlers::get_encounter(combat, encounter_id).await)
            });

        let actions = warp::path!("api" / "encounters" / String / "actions")
            .and(warp::post())
            .and(Self::with_combat(combat.clone()))
            .and(Self::json_body::<RoundAction>())
            .and_then(
                |encounter_id: String, combat: Arc<CombatService>, action: RoundAction| async move {
                    Ok::<_, Infallible>(handlers::submit_action(combat, encounter_id, action).await)
                },
            );

        let rounds = warp::path!("api" / "encounters" / String / "rounds")
            .and(warp::post())
            .and(Self::with_combat(combat.clone()))
            .and_then(|encounter_id: String, combat: Arc<CombatService>| async move {
                Ok::<_, Infallible>(handlers::next_round(combat, encounter_id).await)
            });

        let finish = warp::path!("api" / "encounters" / String)
            .and(warp::delete())
            .and(Self::with_combat(combat))
            .and_then(|encounter_id: String, combat: Arc<CombatService>| async move {
                Ok::<_, Infallible>(handlers::finish_encounter(combat, encounter_id).await)
            });

        start
            .or(actions)
            .unify()
            .or(rounds)
            .unify()
            .or(info)
            .unify()
            .or(finish)
            .unify()
            .boxed()
    }

    fn table_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let tables = context.tables();

        let create = warp::path!("api" / "tables")
            .and(warp::post())
            .and(Self::with_tables(tables.clone()))
            .and(Self::json_body::<handlers::CreateTableRequest>())
            .and_then(
                |tables: Arc<TableService>, request: handlers::CreateTableRequest| async move {
                    Ok::<_, Infallible>(handlers::create_table(tables, request).await)
                },
            );

        let info = warp::path!("api" / "tables" / String)
            .and(warp::get())
            .and(warp::query::<handlers::ViewerQuery>())
            .and(Self::with_tables(tables.clone()))
            .and_then(
                |table_id: String, query: handlers::ViewerQuery, tables: Arc<TableService>| async move {
                    Ok::<_, Infallible>(handlers::get_table(tables, table_id, query).await)
                },
            );

        let seats = warp::path!("api" / "tables" / String / "seats")
            .and(warp::post())
            .and(Self::with_tables(tables.clone()))
            .and(Self::json_body::<SeatRequest>())
            .and_then(
                |table_id: String, tables: Arc<TableService>, request: SeatRequest| async move {
                    Ok::<_, Infallible>(handlers::seat_player(tables, table_id, request).await)
                },
            );

        let hands = warp::path!("api" / "tables" / String / "hands")
            .and(warp::post())
            .and(Self::with_tables(tables.clone()))
            .and(Self::json_body::<StartHandRequest>())
            .and_then(
                |table_id: String, tables: Arc<TableService>, request: StartHandRequest| async move {
                    Ok::<_, Infallible>(handlers::start_hand(tables, table_id, request).await)
                },
            );

        let actions = warp::path!("api" / "tables" / String / "actions")
            .and(warp::post())
            .and(Self::with_tables(tables))
            .and(Self::json_body::<TableActionRequest>())
            .and_then(
                |table_id: String, tables: Arc<TableService>, request: TableActionRequest| async move {
                    Ok::<_, Infallible>(handlers::act(tables, table_id, request).await)
                },
            );

        create
            .or(seats)
            .unify()
            .or(hands)
            .unify()
            .or(actions)
            .unify()
            .or(info)
            .unify()
            .boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let combat = context.combat();
        let tables = context.tables();
        let bus = context.event_bus();

        warp::path!("api" / "channels" / String / "events")
            .and(warp::get())
            .and(Self::with_combat(combat))
            .and(Self::with_tables(tables))
            .and(warp::any().map(move || bus.clone()))
            .and_then(
                |channel_id: String,
                 combat: Arc<CombatService>,
                 tables: Arc<TableService>,
                 bus: EventBus| async move {
                    Ok::<_, Infallible>(
                        handlers::stream_events(channel_id, combat, tables, bus).await,
                    )
                },
            )
            .boxed()
    }

    fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
    where
        T: serde::de::DeserializeOwned + Send,
    {
        warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
    }

    fn with_combat(
        combat: Arc<CombatService>,
    ) -> impl Filter<Extract = (Arc<CombatService>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&combat))
    }

    fn with_tables(
        tables: Arc<TableService>,
    ) -> impl Filter<Extract = (Arc<TableService>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&tables))
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
