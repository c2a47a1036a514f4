use crate::config::ServerConfig;
use crate::session::{Session, SessionEnd};
use crate::transport::{PlainTcp, TlsTransport, Transport};
use crate::ServerError;
use modsim_core::pdu::{ExceptionCode, FunctionCode};
use modsim_core::EncodeError;
use rand::RngCore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, info_span, warn, Instrument};

#[cfg(feature = "metrics")]
use crate::metrics::{ServerMetrics, ServerMetricsSnapshot};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("modbus exception: {0:?}")]
    Exception(ExceptionCode),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

pub trait ModbusService: Send + Sync + 'static {
    /// Handle a validated request and write a response PDU into `response_pdu`.
    ///
    /// Return the number of bytes written. The response must start with the
    /// function code and must not include any framing bytes.
    fn handle(
        &self,
        function: FunctionCode,
        payload: &[u8],
        rng: &mut dyn RngCore,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError>;
}

impl<T> ModbusService for Arc<T>
where
    T: ModbusService + ?Sized,
{
    fn handle(
        &self,
        function: FunctionCode,
        payload: &[u8],
        rng: &mut dyn RngCore,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError> {
        (**self).handle(function, payload, rng, response_pdu)
    }
}

/// Listener that spawns one [`Session`] per accepted connection.
pub struct ModbusServer<T, S> {
    listener: TcpListener,
    transport: Arc<T>,
    service: Arc<S>,
    config: ServerConfig,
    #[cfg(feature = "metrics")]
    metrics: Arc<ServerMetrics>,
}

/// MBAP framing over plain TCP.
pub type ModbusTcpServer<S> = ModbusServer<PlainTcp, S>;

/// Headerless framing over TLS.
pub type ModbusTlsServer<S> = ModbusServer<TlsTransport, S>;

impl<T: Transport, S: ModbusService> ModbusServer<T, S> {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        transport: T,
        service: S,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        config.validate::<T::Codec>()?;
        let listener = TcpListener::bind(addr).await?;
        Self::from_listener(listener, transport, service, config)
    }

    pub fn from_listener(
        listener: TcpListener,
        transport: T,
        service: S,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        config.validate::<T::Codec>()?;
        Ok(Self {
            listener,
            transport: Arc::new(transport),
            service: Arc::new(service),
            config,
            #[cfg(feature = "metrics")]
            metrics: Arc::new(ServerMetrics::default()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_handle(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> ServerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Sessions already
    /// running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut next_session_id: u64 = 0;

        info!(
            addr = ?self.listener.local_addr().ok(),
            transport = T::NAME,
            unit_id = self.config.unit_id,
            "modbus simulator listening"
        );

        loop {
            let (socket, peer) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                () = &mut shutdown => {
                    info!(transport = T::NAME, "modbus simulator shutting down");
                    return Ok(());
                }
            };

            let session_id = next_session_id;
            next_session_id = next_session_id.wrapping_add(1);

            let transport = Arc::clone(&self.transport);
            let service = Arc::clone(&self.service);
            let config = self.config;
            #[cfg(feature = "metrics")]
            let metrics = Arc::clone(&self.metrics);

            let span = info_span!("session", id = session_id, %peer, transport = T::NAME);
            tokio::spawn(
                async move {
                    if let Err(err) = serve_connection(
                        socket,
                        session_id,
                        transport,
                        service,
                        config,
                        #[cfg(feature = "metrics")]
                        metrics,
                    )
                    .await
                    {
                        warn!(error = %err, "modbus session ended with error");
                    }
                }
                .instrument(span),
            );
        }
    }
}

async fn serve_connection<T: Transport, S: ModbusService>(
    socket: TcpStream,
    session_id: u64,
    transport: Arc<T>,
    service: Arc<S>,
    config: ServerConfig,
    #[cfg(feature = "metrics")] metrics: Arc<ServerMetrics>,
) -> Result<(), ServerError> {
    if let Err(err) = socket.set_nodelay(true) {
        debug!(error = %err, "failed to disable nagle");
    }

    let stream = match transport.accept(socket).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "connection setup failed");
            return Ok(());
        }
    };
    info!("session opened");

    let session = Session::new(
        stream,
        transport.codec(&config),
        &config,
        config.session_rng(session_id),
    );
    #[cfg(feature = "metrics")]
    metrics.record_session_opened();
    #[cfg(feature = "metrics")]
    let session = session.with_metrics(Arc::clone(&metrics));

    let end = session.run(&*service).await?;
    match end {
        SessionEnd::Frame(err) => warn!(error = %err, "session closed on bad frame"),
        _ => info!(reason = %end, "session closed"),
    }

    #[cfg(feature = "metrics")]
    metrics.record_session_end(&end);
    Ok(())
}
