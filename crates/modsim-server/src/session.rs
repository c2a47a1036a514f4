use crate::config::ServerConfig;
use crate::{ModbusService, ServerError, ServiceError};
use modsim_core::encoding::Writer;
use modsim_core::frame::{FrameCodec, MAX_FRAME_LEN};
use modsim_core::pdu::{
    validate_pdu, ExceptionCode, ExceptionResponse, Request, Response, MAX_PDU_LEN,
};
use modsim_core::FrameError;
use rand::rngs::StdRng;
use rand::RngCore;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

#[cfg(feature = "metrics")]
use crate::metrics::ServerMetrics;
#[cfg(feature = "metrics")]
use std::sync::Arc;

/// Idle tracking for one session.
///
/// The timer only runs between transactions: it is armed after a response
/// has been written and stopped as soon as the next request arrives. A
/// session that has not served anything yet never times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleTimer {
    #[default]
    Inactive,
    Running(Instant),
}

impl IdleTimer {
    pub fn start(&mut self, now: Instant) {
        *self = Self::Running(now);
    }

    pub fn stop(&mut self) {
        *self = Self::Inactive;
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    /// Instant at which the session is closed if nothing arrives.
    pub fn deadline(&self, max_idle: Duration) -> Option<Instant> {
        match self {
            Self::Inactive => None,
            Self::Running(start) => Some(*start + max_idle),
        }
    }
}

/// Why a session stopped serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side of the stream.
    PeerClosed,
    IdleTimeout,
    /// The last read did not hold an acceptable frame. Nothing was sent.
    Frame(FrameError),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed the connection"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::Frame(err) => write!(f, "{err}"),
        }
    }
}

/// Result of one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    /// Bytes of the encoded response frame.
    pub frame_len: usize,
    /// Set when the response is an exception frame.
    pub exception: Option<ExceptionCode>,
}

/// Run one transaction: decode `frame`, apply the header policy, validate,
/// dispatch and encode the response frame into `out`.
///
/// A [`ServerError::Frame`] means the frame must not be answered.
pub fn transact<C, S>(
    codec: &C,
    service: &S,
    rng: &mut dyn RngCore,
    frame: &[u8],
    out: &mut [u8],
) -> Result<Transaction, ServerError>
where
    C: FrameCodec,
    S: ModbusService + ?Sized,
{
    let request = codec.decode(frame)?;
    log_request(&request);
    codec.accept_header(&request)?;

    let mut pdu = [0u8; MAX_PDU_LEN];
    let handled = match validate_pdu(request.function_code, request.payload) {
        Ok(function) => match service.handle(function, request.payload, rng, &mut pdu) {
            Ok(len) => Ok(len),
            Err(ServiceError::Exception(code)) => Err(code),
            Err(ServiceError::Encode(err)) => return Err(err.into()),
        },
        Err(code) => Err(code),
    };

    let mut exception_data = [0u8; 1];
    let (response, exception) = match handled {
        Ok(len) => {
            let written = pdu
                .get(..len)
                .ok_or(ServerError::InvalidResponse("response pdu exceeds buffer"))?;
            let [function_code, data @ ..] = written else {
                return Err(ServerError::InvalidResponse("empty response pdu"));
            };
            (Response::new(&request, *function_code, data)?, None)
        }
        Err(code) => {
            let exception = ExceptionResponse::new(request.function_code, code);
            (
                Response::exception(&request, exception, &mut exception_data)?,
                Some(code),
            )
        }
    };

    let mut w = Writer::new(out);
    codec.encode(&response, &mut w)?;
    debug!(
        function = response.function_code(),
        frame_len = w.position(),
        "sending modbus response"
    );
    Ok(Transaction {
        frame_len: w.position(),
        exception,
    })
}

fn log_request(request: &Request<'_>) {
    match request.header {
        Some(header) => debug!(
            transaction_id = header.transaction_id,
            protocol_id = header.protocol_id,
            length = header.length,
            unit_id = header.unit_id,
            function = request.function_code,
            payload_len = request.payload.len(),
            "received modbus request"
        ),
        None => debug!(
            function = request.function_code,
            payload_len = request.payload.len(),
            "received modbus request"
        ),
    }
}

/// One accepted connection. Owns its stream until [`Session::run`] returns.
pub struct Session<IO, C> {
    io: IO,
    codec: C,
    timer: IdleTimer,
    max_idle: Duration,
    max_frame_len: usize,
    rng: StdRng,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<ServerMetrics>>,
}

impl<IO, C> Session<IO, C>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    C: FrameCodec,
{
    pub fn new(io: IO, codec: C, config: &ServerConfig, rng: StdRng) -> Self {
        Self {
            io,
            codec,
            timer: IdleTimer::Inactive,
            max_idle: config.max_idle,
            max_frame_len: config.max_frame_len.clamp(C::MIN_FRAME_LEN, MAX_FRAME_LEN),
            rng,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn timer(&self) -> IdleTimer {
        self.timer
    }

    /// Serve requests until the peer leaves, the idle timer expires or a
    /// frame is refused, then close the stream.
    pub async fn run<S>(mut self, service: &S) -> Result<SessionEnd, ServerError>
    where
        S: ModbusService + ?Sized,
    {
        let end = self.serve(service).await;
        // The peer may already be gone.
        let _ = self.io.shutdown().await;
        end
    }

    async fn serve<S>(&mut self, service: &S) -> Result<SessionEnd, ServerError>
    where
        S: ModbusService + ?Sized,
    {
        let mut frame = [0u8; MAX_FRAME_LEN];
        let mut out = [0u8; MAX_FRAME_LEN];
        let max_frame_len = self.max_frame_len;

        loop {
            let read = match self.timer.deadline(self.max_idle) {
                Some(deadline) => {
                    match timeout_at(deadline, self.io.read(&mut frame[..max_frame_len])).await {
                        Ok(read) => read?,
                        Err(_) => return Ok(SessionEnd::IdleTimeout),
                    }
                }
                None => self.io.read(&mut frame[..max_frame_len]).await?,
            };
            if read == 0 {
                return Ok(SessionEnd::PeerClosed);
            }

            self.timer.stop();
            let transaction =
                match transact(&self.codec, service, &mut self.rng, &frame[..read], &mut out) {
                    Ok(transaction) => transaction,
                    Err(ServerError::Frame(err)) => return Ok(SessionEnd::Frame(err)),
                    Err(err) => return Err(err),
                };
            self.io.write_all(&out[..transaction.frame_len]).await?;
            self.io.flush().await?;

            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_transaction(&transaction);
            }

            self.timer.start(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{transact, IdleTimer, Transaction};
    use crate::{ServerError, SyntheticModbusService};
    use modsim_core::frame::{HeaderlessCodec, MbapCodec, MAX_FRAME_LEN};
    use modsim_core::pdu::ExceptionCode;
    use modsim_core::{FrameError, HeaderMismatch};
    use rand::rngs::mock::StepRng;
    use std::time::Duration;
    use tokio::time::Instant;

    fn run_tcp(frame: &[u8]) -> Result<Vec<u8>, ServerError> {
        let mut out = [0u8; MAX_FRAME_LEN];
        let mut rng = StepRng::new(0, 0);
        let Transaction { frame_len, .. } =
            transact(&MbapCodec::new(1), &SyntheticModbusService, &mut rng, frame, &mut out)?;
        Ok(out[..frame_len].to_vec())
    }

    #[test]
    fn timer_deadline_follows_state() {
        let mut timer = IdleTimer::default();
        assert_eq!(timer.deadline(Duration::from_secs(2)), None);

        let now = Instant::now();
        timer.start(now);
        assert!(timer.is_running());
        assert_eq!(timer.deadline(Duration::from_secs(2)), Some(now + Duration::from_secs(2)));

        timer.stop();
        assert!(!timer.is_running());
    }

    #[test]
    fn tcp_read_registers_transaction() {
        let frame = [
            0xBE, 0xEF, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
        ];
        assert_eq!(
            run_tcp(&frame).unwrap(),
            &[0xBE, 0xEF, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn exceptions_are_ordinary_frames() {
        let frame = [
            0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x10, 0x12, 0x34,
        ];
        let mut out = [0u8; MAX_FRAME_LEN];
        let transaction = transact(
            &MbapCodec::new(1),
            &SyntheticModbusService,
            &mut StepRng::new(0, 0),
            &frame,
            &mut out,
        )
        .unwrap();
        assert_eq!(transaction.exception, Some(ExceptionCode::IllegalDataValue));
        assert_eq!(
            &out[..transaction.frame_len],
            &[0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x01, 0x85, 0x03]
        );
    }

    #[test]
    fn header_mismatch_is_not_answered() {
        let frame = [
            0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x02, 0x03, 0x00, 0x00, 0x00, 0x01,
        ];
        assert!(matches!(
            run_tcp(&frame),
            Err(ServerError::Frame(FrameError::HeaderMismatch(HeaderMismatch::UnitId(2))))
        ));
    }

    #[test]
    fn short_frame_is_not_answered() {
        assert!(matches!(
            run_tcp(&[0x00, 0x01, 0x00]),
            Err(ServerError::Frame(FrameError::Incomplete { len: 3, min: 8 }))
        ));
    }

    #[test]
    fn headerless_transaction_skips_header_policy() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let transaction = transact(
            &HeaderlessCodec,
            &SyntheticModbusService,
            &mut StepRng::new(0, 0),
            &[0x06, 0x00, 0x01, 0xAB, 0xCD],
            &mut out,
        )
        .unwrap();
        assert_eq!(transaction.exception, None);
        assert_eq!(&out[..transaction.frame_len], &[0x06, 0x00, 0x01, 0xAB, 0xCD]);
    }
}
